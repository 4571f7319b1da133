//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! output location, provider endpoints, pricing overrides and pipeline
//! defaults. Every section defaults sensibly so an empty file is valid.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::media::StepType;
use crate::pricing::PricingTable;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory chains write into when they do not name their own.
    pub output_dir: PathBuf,
    pub pipeline: PipelineConfig,
    /// Generation provider per step type.
    pub providers: HashMap<StepType, ProviderConfig>,
    /// Pricing overrides layered over the built-in table.
    pub pricing: HashMap<StepType, PricingOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            pipeline: PipelineConfig::default(),
            providers: HashMap::new(),
            pricing: HashMap::new(),
        }
    }
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Built-in pricing with this config's overrides applied.
    pub fn pricing_table(&self) -> PricingTable {
        PricingTable::builtin().with_overrides(&self.pricing)
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.pipeline.default_max_workers == 0 {
            warnings.push("pipeline.default_max_workers is 0; fan-out will use 1 worker".into());
        }

        if self.pipeline.confirm_threshold < 0.0 {
            warnings.push("pipeline.confirm_threshold is negative; every run will prompt".into());
        }

        for (step_type, provider) in &self.providers {
            if !step_type.is_known() {
                warnings.push(format!("providers.{step_type} is not a known step type"));
            } else if !step_type.uses_generator() {
                warnings.push(format!(
                    "providers.{step_type} is ignored; {step_type} runs without a provider"
                ));
            }
            if provider.endpoint.is_empty() {
                warnings.push(format!("providers.{step_type}.endpoint is empty"));
            }
            if provider.timeout_secs == 0 {
                warnings.push(format!("providers.{step_type}.timeout_secs is 0"));
            }
        }

        for step_type in self.pricing.keys() {
            if !step_type.is_known() {
                warnings.push(format!("pricing.{step_type} is not a known step type"));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Execution defaults shared by every chain run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Estimated cost (USD) above which `run` asks for confirmation.
    pub confirm_threshold: f64,
    /// Fan-out pool size used when a step asks for parallelism without
    /// naming `max_workers`.
    pub default_max_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confirm_threshold: 0.0,
            default_max_workers: 4,
        }
    }
}

/// Connection settings for one generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// URL the generation request is POSTed to.
    pub endpoint: String,
    /// Environment variable holding the bearer token, if the provider needs one.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Download `output_url` results into the chain's output directory.
    #[serde(default = "default_true")]
    pub download_outputs: bool,
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

/// Pricing overrides for one step type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingOverride {
    pub default: Option<f64>,
    pub models: HashMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.output_dir, PathBuf::from("./output"));
        assert_eq!(cfg.pipeline.default_max_workers, 4);
        assert!(cfg.providers.is_empty());
    }

    #[test]
    fn default_config_no_warnings() {
        let warnings = Config::default().validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.pipeline.default_max_workers, 4);
    }

    #[test]
    fn parse_providers_and_pricing() {
        let toml = r#"
output_dir = "/tmp/renders"

[pipeline]
confirm_threshold = 1.5

[providers.text_to_image]
endpoint = "http://localhost:9000/t2i"
api_key_env = "FAL_KEY"

[pricing.text_to_image]
default = 0.01

[pricing.text_to_image.models]
flux_dev = 0.002
"#;
        let cfg = Config::from_toml(toml).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/renders"));
        assert_eq!(cfg.pipeline.confirm_threshold, 1.5);

        let provider = &cfg.providers[&StepType::TextToImage];
        assert_eq!(provider.endpoint, "http://localhost:9000/t2i");
        assert_eq!(provider.api_key_env.as_deref(), Some("FAL_KEY"));
        assert_eq!(provider.timeout_secs, 600);
        assert!(provider.download_outputs);

        let pricing = cfg.pricing_table();
        assert_eq!(pricing.unit_cost(&StepType::TextToImage, "auto"), 0.01);
        assert_eq!(pricing.unit_cost(&StepType::TextToImage, "flux_dev"), 0.002);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = Config::from_toml("output_dir = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn provider_for_local_step_warns() {
        let mut cfg = Config::default();
        cfg.providers.insert(
            StepType::SplitImage,
            ProviderConfig {
                endpoint: "http://localhost".into(),
                api_key_env: None,
                timeout_secs: 10,
                download_outputs: true,
            },
        );
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("ignored")));
    }

    #[test]
    fn unknown_provider_type_warns() {
        let toml = r#"
[providers.add_audio]
endpoint = "http://localhost"
"#;
        let cfg = Config::from_toml(toml).unwrap();
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("not a known step type")));
    }

    #[test]
    fn load_or_default_with_none() {
        let cfg = Config::load_or_default(None);
        assert_eq!(cfg.pipeline.default_max_workers, 4);
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/storyforge.toml")));
        assert_eq!(cfg.output_dir, PathBuf::from("./output"));
    }
}
