//! A single declarative unit of work in a chain.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sf_core::{StepType, AUTO_MODEL};

/// Unordered, string-keyed step options (aspect ratio, duration, grid size,
/// parallelism, per-item prompts, ...).
pub type Params = serde_json::Map<String, Value>;

/// One step of a chain. Immutable once the chain has been loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Stable identifier; keys this step's entry in the run outputs.
    /// Filled in by the chain loader when left empty.
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Provider-facing model key. `"auto"` is passed through untouched.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Take input from this earlier step's output instead of the
    /// immediately preceding one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_from: Option<String>,
}

fn default_model() -> String {
    AUTO_MODEL.to_string()
}

fn default_true() -> bool {
    true
}

impl Step {
    /// Create an enabled step with no params.
    pub fn new(name: impl Into<String>, step_type: StepType, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            step_type,
            model: model.into(),
            params: Params::new(),
            enabled: true,
            input_from: None,
        }
    }

    /// Builder: set a param.
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Builder: set the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder: read input from an earlier step.
    pub fn with_input_from(mut self, name: impl Into<String>) -> Self {
        self.input_from = Some(name.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Param accessors
// ---------------------------------------------------------------------------

/// String param; empty strings count as absent.
pub fn param_str<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Boolean param, accepting `true`/`false` and the strings `"true"`/`"false"`.
pub fn param_bool(params: &Params, key: &str) -> Option<bool> {
    match params.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Non-negative integer param, accepting numbers and numeric strings.
pub fn param_usize(params: &Params, key: &str) -> Option<usize> {
    match params.get(key)? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// List-of-strings param. Returns `None` when absent or not a list of strings.
pub fn param_str_list(params: &Params, key: &str) -> Option<Vec<String>> {
    params
        .get(key)?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_defaults() {
        let step: Step = serde_json::from_value(json!({"type": "text_to_image"})).unwrap();
        assert_eq!(step.step_type, StepType::TextToImage);
        assert_eq!(step.model, "auto");
        assert!(step.enabled);
        assert!(step.params.is_empty());
        assert!(step.name.is_empty());
        assert!(step.input_from.is_none());
    }

    #[test]
    fn builder_sets_params() {
        let step = Step::new("clips", StepType::ImageToVideo, "hailuo")
            .with_param("parallel", true)
            .with_param("max_workers", 3)
            .with_enabled(false);
        assert_eq!(param_bool(&step.params, "parallel"), Some(true));
        assert_eq!(param_usize(&step.params, "max_workers"), Some(3));
        assert!(!step.enabled);
    }

    #[test]
    fn param_accessors_accept_strings() {
        let params: Params = serde_json::from_value(json!({
            "parallel": "true",
            "max_workers": "2",
            "prompt": "   ",
            "prompts": ["a", "b"],
            "mixed": ["a", 1],
        }))
        .unwrap();
        assert_eq!(param_bool(&params, "parallel"), Some(true));
        assert_eq!(param_usize(&params, "max_workers"), Some(2));
        assert_eq!(param_str(&params, "prompt"), None);
        assert_eq!(
            param_str_list(&params, "prompts"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(param_str_list(&params, "mixed"), None);
        assert_eq!(param_str_list(&params, "missing"), None);
    }
}
