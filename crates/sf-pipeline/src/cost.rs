//! Static cost estimation. Never touches the network.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sf_core::{MediaKind, PricingTable, StepType};

use crate::chain::Chain;
use crate::executors::{grid_from_params, group_members};
use crate::step::{param_str_list, param_usize, Step};

/// Estimated cost of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEstimate {
    pub name: String,
    pub step_type: StepType,
    pub model: String,
    /// Number of provider calls the step is expected to make.
    pub calls: usize,
    pub unit_cost: f64,
    pub cost: f64,
}

/// Estimated cost of a whole chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub total_cost: f64,
    pub steps: Vec<StepEstimate>,
}

/// Estimate what running the enabled steps of `chain` will cost.
///
/// Item counts flow between steps the same way outputs do at run time, so a
/// fan-out step after a grid split is charged once per tile.
pub fn estimate_chain_cost(chain: &Chain, pricing: &PricingTable) -> CostEstimate {
    let mut produced: HashMap<&str, usize> = HashMap::new();
    let mut previous = 1;
    let mut steps = Vec::new();
    for step in chain.enabled_steps() {
        let incoming = step
            .input_from
            .as_deref()
            .and_then(|from| produced.get(from).copied())
            .unwrap_or(previous);
        let (estimate, items) = estimate_step(step, pricing, incoming);
        produced.insert(step.name.as_str(), items);
        previous = items;
        steps.push(estimate);
    }
    CostEstimate {
        total_cost: steps.iter().map(|s| s.cost).sum(),
        steps,
    }
}

/// Estimate for one step fed `incoming` items, plus how many items it hands on.
fn estimate_step(step: &Step, pricing: &PricingTable, incoming: usize) -> (StepEstimate, usize) {
    if step.step_type == StepType::ParallelGroup {
        let members: Vec<(StepEstimate, usize)> = group_members(step)
            .unwrap_or_default()
            .iter()
            .filter(|m| m.enabled)
            .map(|m| estimate_step(m, pricing, incoming))
            .collect();
        let estimate = StepEstimate {
            name: step.name.clone(),
            step_type: step.step_type.clone(),
            model: step.model.clone(),
            calls: members.iter().map(|(m, _)| m.calls).sum(),
            unit_cost: 0.0,
            cost: members.iter().map(|(m, _)| m.cost).sum(),
        };
        return (estimate, members.iter().map(|(_, items)| items).sum());
    }

    let calls = if step.step_type.supports_fan_out() && incoming > 1 {
        incoming
    } else {
        expected_calls(step)
    };
    let items = match step.step_type {
        StepType::SplitImage => {
            let (rows, cols) = grid_from_params(&step.params).unwrap_or((2, 2));
            incoming * (rows * cols) as usize
        }
        _ if step.step_type.output_kind() == Some(MediaKind::Text) => 1,
        _ => calls,
    };
    let unit_cost = pricing.unit_cost(&step.step_type, &step.model);
    let estimate = StepEstimate {
        name: step.name.clone(),
        step_type: step.step_type.clone(),
        model: step.model.clone(),
        calls,
        unit_cost,
        cost: unit_cost * calls as f64,
    };
    (estimate, items)
}

/// `prompts` length, else `num_outputs`/`count`, else one call.
fn expected_calls(step: &Step) -> usize {
    if let Some(prompts) = param_str_list(&step.params, "prompts") {
        if !prompts.is_empty() {
            return prompts.len();
        }
    }
    param_usize(&step.params, "num_outputs")
        .or_else(|| param_usize(&step.params, "count"))
        .filter(|n| *n > 0)
        .unwrap_or(1)
}
