//! The [`StepExecutor`] trait and the shared machinery executors build on.
//!
//! Executors return `sf_core::Result<StepResult>` internally. The boundary
//! function [`execute_step`] turns both `Err` and panics into a failed
//! [`StepResult`], so the orchestrator never has to handle a raised error
//! for a single step.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use sf_core::{PricingTable, StepType};

use crate::chain::ChainConfig;
use crate::context::StepContext;
use crate::fanout::{self, FanOutSettings};
use crate::generator::{GenerationRequest, Generator};
use crate::input::{MediaRef, StepInput};
use crate::result::StepResult;
use crate::step::{Params, Step};

/// How to run one step type.
///
/// Implementations must not mutate the step or chain. Provider failures
/// they can classify are returned as `Ok` with `success: false`; anything
/// else may be returned as `Err` and is normalised at the boundary.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// The step type this executor handles.
    fn step_type(&self) -> StepType;

    /// Run `step` on `input`.
    async fn run(
        &self,
        step: &Step,
        input: &StepInput,
        chain: &ChainConfig,
        ctx: &StepContext,
    ) -> sf_core::Result<StepResult>;
}

/// Run an executor, converting errors and panics into a failed result that
/// carries the time spent up to the failure.
pub async fn execute_step(
    executor: &dyn StepExecutor,
    step: &Step,
    input: &StepInput,
    chain: &ChainConfig,
    ctx: &StepContext,
) -> StepResult {
    let started = Instant::now();
    let outcome = AssertUnwindSafe(executor.run(step, input, chain, ctx))
        .catch_unwind()
        .await;
    let elapsed = started.elapsed().as_secs_f64();

    match outcome {
        Ok(Ok(result)) => result.checked(),
        Ok(Err(e)) => {
            tracing::warn!(step = %step.name, "Executor error: {e}");
            StepResult::failure(&step.model, e.to_string(), elapsed)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(step = %step.name, "Executor panicked: {message}");
            StepResult::failure(&step.model, format!("executor panicked: {message}"), elapsed)
        }
    }
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Merge params for one step invocation.
///
/// Priority, highest first: the step's own params, chain-level defaults,
/// then caller overrides. Keys in `reserved` are never taken from the chain
/// defaults because the executor handles them specially.
pub fn resolve_params(
    step: &Step,
    chain: &ChainConfig,
    overrides: &Params,
    reserved: &[&str],
) -> Params {
    let mut params = overrides.clone();
    for (key, value) in &chain.defaults {
        if !reserved.contains(&key.as_str()) {
            params.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in &step.params {
        params.insert(key.clone(), value.clone());
    }
    params
}

/// Write a text output to `<output_dir>/<name>.txt`.
pub async fn write_text_output(output_dir: &Path, name: &str, text: &str) -> sf_core::Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(format!("{name}.txt"));
    tokio::fs::write(&path, text).await?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Generation helpers
// ---------------------------------------------------------------------------

/// A generator plus the pricing used when it does not report a cost.
#[derive(Clone)]
pub struct PricedGenerator {
    pub generator: Arc<dyn Generator>,
    pub pricing: Arc<PricingTable>,
}

impl PricedGenerator {
    pub fn new(generator: Arc<dyn Generator>, pricing: Arc<PricingTable>) -> Self {
        Self { generator, pricing }
    }

    /// Fallback cost for one call of `step_type` with `model`.
    pub fn unit_cost(&self, step_type: &StepType, model: &str) -> f64 {
        self.pricing.unit_cost(step_type, model)
    }

    /// Perform one generation call and normalise the reply.
    pub async fn generate_once(&self, request: GenerationRequest) -> sf_core::Result<StepResult> {
        let started = Instant::now();
        let model = request.model.clone();
        let fallback = self.unit_cost(&request.step_type, &model);
        tracing::debug!(
            provider = self.generator.name(),
            step_type = %request.step_type,
            model = %model,
            "Generation request"
        );
        let response = self.generator.generate(request).await?;
        Ok(StepResult::from_response(
            response,
            &model,
            fallback,
            started.elapsed().as_secs_f64(),
        ))
    }

    /// Generate once per media item through the fan-out engine.
    ///
    /// `template` carries everything shared between items; each item gets its
    /// own input and, when `prompts` is set, its own prompt.
    pub async fn generate_each(
        &self,
        template: GenerationRequest,
        media: Vec<MediaRef>,
        settings: &FanOutSettings,
    ) -> StepResult {
        let started = Instant::now();
        let model = template.model.clone();
        let workers = settings.workers_for(media.len());
        tracing::info!(
            items = media.len(),
            workers,
            parallel = settings.parallel,
            "Fanning out {}",
            template.step_type
        );

        let priced = self.clone();
        let settings = settings.clone();
        let outcomes = fanout::run(media, workers, move |index, item| {
            let priced = priced.clone();
            let request = template
                .clone()
                .with_prompt(settings.prompt_for(index, template.prompt.as_deref()))
                .with_input(item)
                .for_item(index);
            async move {
                priced
                    .generate_once(request)
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await;

        fanout::aggregate(outcomes, &model, started.elapsed().as_secs_f64())
    }
}
