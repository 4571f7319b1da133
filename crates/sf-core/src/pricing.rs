//! Static per-call pricing used for cost estimation and as a fallback when a
//! provider does not report what a call cost.
//!
//! The table is built once (built-in defaults plus any configured overrides)
//! and shared read-only afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::PricingOverride;
use crate::media::StepType;

/// Model key that defers model selection to the provider.
pub const AUTO_MODEL: &str = "auto";

/// Per-call prices for one step type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepPricing {
    /// Price charged when the model is `"auto"` or has no explicit entry.
    pub default: f64,
    /// Price per call keyed by model identifier.
    pub models: HashMap<String, f64>,
}

impl StepPricing {
    fn new(default: f64, models: &[(&str, f64)]) -> Self {
        Self {
            default,
            models: models
                .iter()
                .map(|(model, cost)| ((*model).to_string(), *cost))
                .collect(),
        }
    }

    /// Price of a single call with `model`.
    pub fn unit_cost(&self, model: &str) -> f64 {
        if model == AUTO_MODEL {
            return self.default;
        }
        self.models.get(model).copied().unwrap_or(self.default)
    }
}

/// Read-only pricing registry keyed by step type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingTable {
    entries: HashMap<StepType, StepPricing>,
}

impl PricingTable {
    /// A table with no entries; every lookup costs nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table shipped with storyforge.
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            StepType::TextToImage,
            StepPricing::new(
                0.004,
                &[("flux_dev", 0.003), ("flux_schnell", 0.001), ("imagen4", 0.004)],
            ),
        );
        entries.insert(
            StepType::TextToVideo,
            StepPricing::new(0.50, &[("hailuo", 0.27), ("kling_2_1", 0.50), ("veo3", 3.00)]),
        );
        entries.insert(
            StepType::ImageToImage,
            StepPricing::new(0.02, &[("flux_kontext", 0.04), ("seededit", 0.02)]),
        );
        entries.insert(
            StepType::ImageToVideo,
            StepPricing::new(
                0.40,
                &[("hailuo", 0.27), ("kling_2_1", 0.50), ("seedance", 0.18)],
            ),
        );
        entries.insert(
            StepType::ImageUnderstanding,
            StepPricing::new(0.001, &[("gemini", 0.001)]),
        );
        entries.insert(
            StepType::PromptGeneration,
            StepPricing::new(0.002, &[("gemini", 0.002)]),
        );
        entries.insert(StepType::SplitImage, StepPricing::default());
        entries.insert(
            StepType::UpscaleImage,
            StepPricing::new(0.02, &[("seedvr", 0.02), ("topaz", 0.08)]),
        );
        entries.insert(
            StepType::UpscaleVideo,
            StepPricing::new(0.20, &[("topaz", 0.40)]),
        );
        entries.insert(StepType::ParallelGroup, StepPricing::default());
        Self { entries }
    }

    /// Apply configured overrides on top of this table.
    pub fn with_overrides(mut self, overrides: &HashMap<StepType, PricingOverride>) -> Self {
        for (step_type, over) in overrides {
            let entry = self.entries.entry(step_type.clone()).or_default();
            if let Some(default) = over.default {
                entry.default = default;
            }
            entry
                .models
                .extend(over.models.iter().map(|(k, v)| (k.clone(), *v)));
        }
        self
    }

    /// Pricing entry for `step_type`, if any.
    pub fn get(&self, step_type: &StepType) -> Option<&StepPricing> {
        self.entries.get(step_type)
    }

    /// Price of a single call of `step_type` with `model`; zero when unpriced.
    pub fn unit_cost(&self, step_type: &StepType, model: &str) -> f64 {
        self.get(step_type)
            .map(|pricing| pricing.unit_cost(model))
            .unwrap_or(0.0)
    }
}
