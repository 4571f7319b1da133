//! The [`Generator`] trait: the opaque provider capability every
//! generation-backed executor wraps.
//!
//! A generator returns `Ok` with `success: false` for failures the provider
//! reported (bad input, rejected request, exhausted credit) and `Err` only
//! for problems it could not classify (transport errors, malformed replies).

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sf_core::StepType;

use crate::context::StepContext;
use crate::input::MediaRef;
use crate::step::{Params, Step};

/// Everything a provider needs for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub step_type: StepType,
    /// Requested model; `"auto"` is forwarded as-is.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<MediaRef>,
    pub params: Params,
    /// Directory the provider may write its output into.
    pub output_dir: PathBuf,
    /// Suggested file stem for the produced file.
    pub output_name: String,
    /// Position of this call within a fan-out step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_index: Option<usize>,
}

impl GenerationRequest {
    /// A request for `step` with no prompt, input or params yet.
    pub fn for_step(step: &Step, ctx: &StepContext) -> Self {
        Self {
            step_type: step.step_type.clone(),
            model: step.model.clone(),
            prompt: None,
            input: None,
            params: Params::new(),
            output_dir: ctx.output_dir.clone(),
            output_name: step.name.clone(),
            item_index: None,
        }
    }

    pub fn with_prompt(mut self, prompt: Option<String>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_input(mut self, input: MediaRef) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Mark this request as fan-out item `index` (0-based).
    pub fn for_item(mut self, index: usize) -> Self {
        self.output_name = format!("{}_{:02}", self.output_name, index + 1);
        self.item_index = Some(index);
        self
    }
}

/// Normalized provider reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationResponse {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub output_url: Option<String>,
    pub output_text: Option<String>,
    pub cost_estimate: Option<f64>,
    pub processing_time: Option<f64>,
    pub model_used: Option<String>,
    pub metadata: Params,
    pub error: Option<String>,
}

impl GenerationResponse {
    /// A provider-reported failure.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// A success that wrote a local file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            success: true,
            output_path: Some(path.into()),
            ..Self::default()
        }
    }
}

/// A generation provider for one step type.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short identifier used in errors and logs (e.g. `"fal"`).
    fn name(&self) -> &str;

    /// Perform one generation call.
    async fn generate(&self, request: GenerationRequest) -> sf_core::Result<GenerationResponse>;
}
