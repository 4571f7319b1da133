//! Step and chain result types.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sf_core::RunId;

use crate::generator::GenerationResponse;
use crate::input::{MediaRef, StepInput};
use crate::step::Params;

/// Outcome of one executor invocation.
///
/// A failed result always carries an `error`; a successful one always has
/// at least one of `output_path`, `output_url`, `output_paths`, `output_urls`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    /// Outputs of a fan-out step, in original input order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_paths: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_urls: Vec<String>,
    /// Every output of a fan-out step as one ordered list, mixing local files
    /// and URLs exactly as the items produced them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_items: Vec<MediaRef>,
    /// Text produced by understanding / prompt steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_text: Option<String>,
    /// Seconds spent in this step.
    pub processing_time: f64,
    /// USD spent in this step.
    pub cost: f64,
    /// Model actually used; differs from the requested one for `"auto"`.
    pub model: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    /// A failed result. Empty error messages are replaced so the failure
    /// always explains itself.
    pub fn failure(model: impl Into<String>, error: impl Into<String>, elapsed: f64) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "step failed without an error message".into();
        }
        Self {
            success: false,
            processing_time: elapsed,
            model: model.into(),
            error: Some(error),
            ..Self::default()
        }
    }

    /// Normalize a generator response.
    ///
    /// `fallback_cost` applies when the provider did not report a cost for a
    /// successful call; `elapsed` when it did not report its own timing.
    pub fn from_response(
        response: GenerationResponse,
        requested_model: &str,
        fallback_cost: f64,
        elapsed: f64,
    ) -> Self {
        let model = response
            .model_used
            .clone()
            .unwrap_or_else(|| requested_model.to_string());
        let processing_time = response.processing_time.unwrap_or(elapsed);

        if !response.success {
            let mut result = Self::failure(
                model,
                response.error.unwrap_or_default(),
                processing_time,
            );
            // Providers may bill for work done before failing.
            result.cost = response.cost_estimate.unwrap_or(0.0);
            result.metadata = response.metadata;
            return result;
        }

        let result = Self {
            success: true,
            output_path: response.output_path,
            output_url: response.output_url,
            output_text: response.output_text,
            processing_time,
            cost: response.cost_estimate.unwrap_or(fallback_cost),
            model,
            metadata: response.metadata,
            ..Self::default()
        };
        result.checked()
    }

    /// Downgrade a "successful" result that produced nothing to a failure.
    pub fn checked(self) -> Self {
        if self.success && !self.has_output() {
            let mut failed = Self::failure(
                self.model,
                "step reported success without producing an output",
                self.processing_time,
            );
            failed.cost = self.cost;
            failed.metadata = self.metadata;
            return failed;
        }
        if !self.success && self.error.as_deref().map_or(true, |e| e.trim().is_empty()) {
            let mut failed = self;
            failed.error = Some("step failed without an error message".into());
            return failed;
        }
        self
    }

    pub fn has_output(&self) -> bool {
        self.output_path.is_some()
            || self.output_url.is_some()
            || !self.output_paths.is_empty()
            || !self.output_urls.is_empty()
            || !self.output_items.is_empty()
    }

    /// All media outputs in production order.
    pub fn media_outputs(&self) -> Vec<MediaRef> {
        if !self.output_items.is_empty() {
            return self.output_items.clone();
        }
        let mut media = Vec::new();
        if let Some(path) = &self.output_path {
            media.push(MediaRef::Path(path.clone()));
        } else if let Some(url) = &self.output_url {
            media.push(MediaRef::Url(url.clone()));
        }
        media.extend(self.output_paths.iter().cloned().map(MediaRef::Path));
        media.extend(self.output_urls.iter().cloned().map(MediaRef::Url));
        media
    }

    /// The single most representative output location, for telemetry.
    pub fn primary_output(&self) -> Option<String> {
        self.output_path
            .as_ref()
            .map(|p| p.display().to_string())
            .or_else(|| self.output_paths.first().map(|p| p.display().to_string()))
            .or_else(|| self.output_url.clone())
            .or_else(|| self.output_urls.first().cloned())
    }

    /// Shape this result into the input the next step expects.
    pub fn next_input(&self) -> StepInput {
        if let Some(text) = &self.output_text {
            return StepInput::Text(text.clone());
        }
        let mut items: Vec<StepInput> = self
            .media_outputs()
            .into_iter()
            .map(|media| match media {
                MediaRef::Path(path) => StepInput::Path(path),
                MediaRef::Url(url) => StepInput::Url(url),
            })
            .collect();
        match items.len() {
            0 => StepInput::None,
            1 => items.remove(0),
            _ => StepInput::Many(items),
        }
    }
}

/// Aggregate of one full chain run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainResult {
    pub run_id: RunId,
    pub chain: String,
    pub success: bool,
    /// Steps that completed successfully before the run ended.
    pub steps_completed: usize,
    pub total_steps: usize,
    /// Sum of every executed step's cost, including a failing step's.
    pub total_cost: f64,
    /// Sum of every executed step's processing time.
    pub total_time: f64,
    /// Successful step results keyed by step name, in execution order.
    pub outputs: IndexMap<String, StepResult>,
    /// The step that aborted the run, with whatever it produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<FailedStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The step that aborted a chain run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedStep {
    pub index: usize,
    pub name: String,
    pub result: StepResult,
}

impl ChainResult {
    pub(crate) fn new(run_id: RunId, chain: impl Into<String>, total_steps: usize) -> Self {
        Self {
            run_id,
            chain: chain.into(),
            success: false,
            steps_completed: 0,
            total_steps,
            total_cost: 0.0,
            total_time: 0.0,
            outputs: IndexMap::new(),
            failed_step: None,
            error: None,
        }
    }

    /// Result of a named step, if it completed.
    pub fn output(&self, step_name: &str) -> Option<&StepResult> {
        self.outputs.get(step_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(success: bool) -> GenerationResponse {
        GenerationResponse {
            success,
            ..GenerationResponse::default()
        }
    }

    #[test]
    fn failure_always_has_error() {
        let result = StepResult::failure("auto", "", 0.5);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("without an error message"));
    }

    #[test]
    fn from_response_uses_reported_values() {
        let mut resp = response(true);
        resp.output_path = Some("/out/a.png".into());
        resp.cost_estimate = Some(0.02);
        resp.processing_time = Some(3.0);
        resp.model_used = Some("flux_dev".into());

        let result = StepResult::from_response(resp, "auto", 0.5, 9.0);
        assert!(result.success);
        assert_eq!(result.cost, 0.02);
        assert_eq!(result.processing_time, 3.0);
        assert_eq!(result.model, "flux_dev");
    }

    #[test]
    fn from_response_falls_back_to_pricing_and_elapsed() {
        let mut resp = response(true);
        resp.output_url = Some("https://x/a.png".into());

        let result = StepResult::from_response(resp, "hailuo", 0.27, 1.5);
        assert_eq!(result.cost, 0.27);
        assert_eq!(result.processing_time, 1.5);
        assert_eq!(result.model, "hailuo");
    }

    #[test]
    fn success_without_output_becomes_failure() {
        let result = StepResult::from_response(response(true), "auto", 0.1, 1.0);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("without producing an output"));
    }

    #[test]
    fn text_alone_is_not_an_output() {
        let mut resp = response(true);
        resp.output_text = Some("a caption".into());
        let result = StepResult::from_response(resp, "auto", 0.1, 1.0);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("without producing an output"));
    }

    #[test]
    fn failed_response_keeps_partial_cost() {
        let mut resp = response(false);
        resp.error = Some("no credit".into());
        resp.cost_estimate = Some(0.01);

        let result = StepResult::from_response(resp, "auto", 0.5, 1.0);
        assert!(!result.success);
        assert_eq!(result.cost, 0.01);
        assert_eq!(result.error.as_deref(), Some("no credit"));
    }

    #[test]
    fn next_input_shapes() {
        let text = StepResult {
            success: true,
            output_path: Some("/out/p.txt".into()),
            output_text: Some("a prompt".into()),
            ..StepResult::default()
        };
        assert_eq!(text.next_input(), StepInput::Text("a prompt".into()));

        let many = StepResult {
            success: true,
            output_paths: vec!["/a.png".into(), "/b.png".into()],
            ..StepResult::default()
        };
        assert!(matches!(many.next_input(), StepInput::Many(ref items) if items.len() == 2));

        let single = StepResult {
            success: true,
            output_paths: vec!["/a.png".into()],
            ..StepResult::default()
        };
        assert_eq!(single.next_input(), StepInput::Path("/a.png".into()));

        let url = StepResult {
            success: true,
            output_url: Some("https://x/v.mp4".into()),
            ..StepResult::default()
        };
        assert_eq!(url.next_input(), StepInput::Url("https://x/v.mp4".into()));

        assert_eq!(StepResult::default().next_input(), StepInput::None);
    }

    #[test]
    fn ordered_items_win_over_split_lists() {
        let result = StepResult {
            success: true,
            output_paths: vec!["/b.png".into()],
            output_urls: vec!["https://x/a.png".into()],
            output_items: vec![
                MediaRef::Url("https://x/a.png".into()),
                MediaRef::Path("/b.png".into()),
            ],
            ..StepResult::default()
        };
        assert_eq!(
            result.next_input(),
            StepInput::Many(vec![
                StepInput::Url("https://x/a.png".into()),
                StepInput::Path("/b.png".into()),
            ])
        );
    }

    #[test]
    fn primary_output_prefers_local_paths() {
        let result = StepResult {
            success: true,
            output_url: Some("https://x/a.png".into()),
            output_paths: vec!["/a.png".into()],
            ..StepResult::default()
        };
        assert_eq!(result.primary_output().as_deref(), Some("/a.png"));
    }
}
