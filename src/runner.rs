//! Wiring between the application config and the pipeline crate.

use anyhow::{Context, Result};
use sf_core::config::Config;
use sf_pipeline::{
    Chain, ChainExecutor, ExecutorRegistry, Generator, GeneratorSet, HttpGenerator, StepInput,
};
use std::path::Path;
use std::sync::Arc;

/// One HTTP generator per configured provider.
///
/// Providers for unknown step types, or for step types that never call a
/// generator, are skipped with a warning.
pub fn build_generators(config: &Config) -> Result<GeneratorSet> {
    let mut generators = GeneratorSet::new();
    for (step_type, provider) in &config.providers {
        if !step_type.uses_generator() {
            tracing::warn!("Ignoring provider for {}: step type takes no generator", step_type);
            continue;
        }
        let generator = HttpGenerator::from_config(step_type, provider)?;
        tracing::debug!("Provider {} -> {}", generator.name(), provider.endpoint);
        generators.insert(step_type.clone(), Arc::new(generator) as Arc<dyn Generator>);
    }
    Ok(generators)
}

/// Build the executor registry for this process.
pub fn build_registry(config: &Config) -> Result<ExecutorRegistry> {
    let generators = build_generators(config)?;
    Ok(ExecutorRegistry::from_generators(
        &generators,
        config.pricing_table(),
    ))
}

/// Build a chain executor honoring the config's output and worker defaults.
pub fn build_executor(config: &Config) -> Result<ChainExecutor> {
    let registry = build_registry(config)?;
    Ok(ChainExecutor::new(Arc::new(registry))
        .with_output_dir(config.output_dir.clone())
        .with_default_max_workers(config.pipeline.default_max_workers))
}

/// Load a chain definition, YAML or JSON by extension.
pub fn load_chain(path: &Path) -> Result<Chain> {
    Chain::load(path).with_context(|| format!("Failed to load chain: {:?}", path))
}

/// Interpret a `--input` argument.
///
/// Values starting with `{` or `[` are parsed as JSON; anything else is a
/// URL, an existing file, or prompt text.
pub fn parse_input(raw: &str) -> Result<StepInput> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        let value: serde_json::Value =
            serde_json::from_str(raw).context("--input looks like JSON but does not parse")?;
        return Ok(StepInput::from_value(&value)?);
    }
    Ok(StepInput::from(raw))
}
