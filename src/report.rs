//! Human-readable summaries printed by the CLI.

use std::fmt::Write;

use sf_pipeline::{ChainResult, CostEstimate};

pub fn format_estimate(chain: &str, estimate: &CostEstimate) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Chain: {}", chain);
    for (i, step) in estimate.steps.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {} [{} / {}] {} call(s) ${:.3}",
            i + 1,
            step.name,
            step.step_type,
            step.model,
            step.calls,
            step.cost
        );
    }
    let _ = write!(out, "Estimated total: ${:.3}", estimate.total_cost);
    out
}

pub fn format_result(result: &ChainResult) -> String {
    let mut out = String::new();
    let status = if result.success { "completed" } else { "FAILED" };
    let _ = writeln!(
        out,
        "Chain '{}' {} ({}/{} steps)",
        result.chain, status, result.steps_completed, result.total_steps
    );

    for (name, step) in &result.outputs {
        let location = step.primary_output().unwrap_or_else(|| "-".into());
        let extra = match step.media_outputs().len() {
            0 | 1 => String::new(),
            n => format!(" (+{} more)", n - 1),
        };
        let _ = writeln!(out, "  {}: {}{}", name, location, extra);
    }

    if let Some(error) = &result.error {
        let _ = writeln!(out, "Error: {}", error);
    }
    let _ = write!(
        out,
        "Cost: ${:.3}  Time: {:.1}s",
        result.total_cost, result.total_time
    );
    out
}
