//! Chain model: an ordered, named list of steps plus chain-level config.
//!
//! Chains are loaded from YAML or JSON documents:
//!
//! ```yaml
//! name: lighthouse
//! prompt: a lighthouse at dusk, oil painting
//! config:
//!   output_dir: ./output/lighthouse
//!   aspect_ratio: "16:9"
//! steps:
//!   - type: text_to_image
//!     model: flux_dev
//!   - type: image_to_video
//!     model: hailuo
//!     params: { duration: 6 }
//! ```
//!
//! `prompt`, `input_image`, `input_video` and `output_dir` may sit at the top
//! level or inside `config`; any other `config` key is a chain-level default
//! merged into every step's params.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sf_core::{MediaKind, StepType};

use crate::executors::{group_members, parse_grid};
use crate::input::StepInput;
use crate::step::{param_bool, param_str, param_usize, Params, Step};

/// Chain-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_video: Option<String>,
    /// Defaults merged under every step's params.
    #[serde(flatten)]
    pub defaults: Params,
}

/// A parsed chain. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ChainDocument")]
pub struct Chain {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub config: ChainConfig,
    /// File the chain was loaded from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// On-disk shape, accepting the top-level input shortcuts.
#[derive(Deserialize)]
struct ChainDocument {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    steps: Vec<Step>,
    #[serde(default)]
    config: ChainConfig,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    input_image: Option<String>,
    #[serde(default)]
    input_video: Option<String>,
    #[serde(default)]
    output_dir: Option<PathBuf>,
}

impl From<ChainDocument> for Chain {
    fn from(doc: ChainDocument) -> Self {
        let mut config = doc.config;
        config.prompt = config.prompt.or(doc.prompt);
        config.input_image = config.input_image.or(doc.input_image);
        config.input_video = config.input_video.or(doc.input_video);
        config.output_dir = config.output_dir.or(doc.output_dir);

        let mut steps = doc.steps;
        for (index, step) in steps.iter_mut().enumerate() {
            if step.name.trim().is_empty() {
                step.name = format!("step_{}_{}", index + 1, step.step_type);
            }
        }

        Self {
            name: doc.name,
            description: doc.description,
            steps,
            config,
            source: None,
        }
    }
}

impl Chain {
    /// Create a chain from already-built steps. Unnamed steps are named
    /// `step_<n>_<type>`.
    pub fn new(name: impl Into<String>, steps: Vec<Step>, config: ChainConfig) -> Self {
        Chain::from(ChainDocument {
            name: name.into(),
            description: None,
            steps,
            config,
            prompt: None,
            input_image: None,
            input_video: None,
            output_dir: None,
        })
    }

    pub fn from_yaml(text: &str) -> sf_core::Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| sf_core::Error::Validation(format!("invalid chain YAML: {e}")))
    }

    pub fn from_json(text: &str) -> sf_core::Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| sf_core::Error::Validation(format!("invalid chain JSON: {e}")))
    }

    /// Load a chain file; `.yaml`/`.yml` parse as YAML, anything else as JSON.
    pub fn load(path: &Path) -> sf_core::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        let mut chain = if is_yaml {
            Self::from_yaml(&text)?
        } else {
            Self::from_json(&text)?
        };
        chain.source = Some(path.to_path_buf());
        tracing::debug!(
            chain = %chain.name,
            path = %path.display(),
            steps = chain.steps.len(),
            "Loaded chain"
        );
        Ok(chain)
    }

    /// Enabled steps in declaration order.
    pub fn enabled_steps(&self) -> Vec<&Step> {
        self.steps.iter().filter(|s| s.enabled).collect()
    }

    /// Kind of input the first enabled step requires.
    pub fn initial_input_type(&self) -> Option<MediaKind> {
        self.enabled_steps().first()?.step_type.input_kind()
    }

    /// Initial input taken from chain config, matched to what the first
    /// enabled step needs. `Any` takes the prompt, then an image, then a video.
    pub fn initial_input(&self) -> Option<StepInput> {
        let field = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let text = || field(&self.config.prompt).map(StepInput::Text);
        let image = || field(&self.config.input_image).map(|s| StepInput::location(&s));
        let video = || field(&self.config.input_video).map(|s| StepInput::location(&s));
        match self.initial_input_type()? {
            MediaKind::Text => text(),
            MediaKind::Image => image(),
            MediaKind::Video => video(),
            MediaKind::Any => text().or_else(image).or_else(video),
        }
    }

    /// Structural validation. An empty list means the chain may run.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("chain has no name".to_string());
        }

        // Group members share one namespace with top-level steps.
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !step.step_type.is_known() {
                errors.push(format!("step '{}': unknown step type '{}'", step.name, step.step_type));
            }
            let mut names = vec![step.name.clone()];
            if step.step_type == StepType::ParallelGroup {
                if let Ok(members) = group_members(step) {
                    names.extend(members.into_iter().map(|m| m.name));
                }
            }
            for name in names {
                if !seen.insert(name.clone()) {
                    errors.push(format!("duplicate step name '{name}'"));
                }
            }
        }

        let enabled = self.enabled_steps();
        if enabled.is_empty() {
            errors.push("chain has no enabled steps".to_string());
            return errors;
        }
        if self.initial_input_type().is_none() {
            errors.push(format!(
                "cannot determine the initial input type from step '{}'",
                enabled[0].name
            ));
        }

        for (position, step) in enabled.iter().enumerate() {
            check_params(step, &mut errors);

            let source = match &step.input_from {
                Some(from) => match enabled[..position].iter().find(|s| &s.name == from) {
                    Some(source) => Some(*source),
                    None => {
                        errors.push(format!(
                            "step '{}': input_from '{from}' is not an earlier enabled step",
                            step.name
                        ));
                        continue;
                    }
                },
                None => position.checked_sub(1).map(|prev| enabled[prev]),
            };
            let Some(source) = source else { continue };
            if let (Some(produced), Some(expected)) =
                (source.step_type.output_kind(), step.step_type.input_kind())
            {
                if !produced.feeds(expected) {
                    errors.push(format!(
                        "step '{}' expects {expected} input but '{}' produces {produced}",
                        step.name, source.name
                    ));
                }
            }
        }

        errors
    }
}

/// Param checks shared by top-level steps and group members.
fn check_params(step: &Step, errors: &mut Vec<String>) {
    let params = &step.params;
    if params.contains_key("max_workers") && !param_usize(params, "max_workers").is_some_and(|n| n > 0) {
        errors.push(format!("step '{}': max_workers must be a positive integer", step.name));
    }
    if params.contains_key("parallel") && param_bool(params, "parallel").is_none() {
        errors.push(format!("step '{}': parallel must be true or false", step.name));
    }
    if let Some(prompts) = params.get("prompts") {
        let all_strings = prompts
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string));
        if !all_strings {
            errors.push(format!("step '{}': prompts must be a list of strings", step.name));
        }
    }

    match step.step_type {
        StepType::SplitImage => {
            if let Some(grid) = param_str(params, "grid") {
                if parse_grid(grid).is_none() {
                    errors.push(format!(
                        "step '{}': grid '{grid}' must look like RxC (e.g. 2x2)",
                        step.name
                    ));
                }
            }
        }
        StepType::ParallelGroup => match group_members(step) {
            Ok(members) if members.is_empty() => {
                errors.push(format!("step '{}': parallel_group needs at least one step", step.name));
            }
            Ok(members) => {
                for member in &members {
                    match &member.step_type {
                        StepType::ParallelGroup => errors.push(format!(
                            "step '{}': parallel_group cannot contain another group ('{}')",
                            step.name, member.name
                        )),
                        t if !t.is_known() => errors.push(format!(
                            "step '{}': member '{}' has unknown step type '{t}'",
                            step.name, member.name
                        )),
                        _ => check_params(member, errors),
                    }
                }
            }
            Err(e) => errors.push(format!("step '{}': {e}", step.name)),
        },
        _ => {}
    }
}
