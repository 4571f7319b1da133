//! Cost confirmation gate for `run`.

use std::io::{self, BufRead, IsTerminal, Write};

use sf_pipeline::CostEstimate;

use crate::report::format_estimate;

/// Environment variables that mark a non-interactive session when set.
pub const CI_ENV_VARS: [&str; 3] = ["CI", "GITHUB_ACTIONS", "STORYFORGE_NO_CONFIRM"];

/// True when nobody is around to answer a prompt.
pub fn is_non_interactive() -> bool {
    let ci = CI_ENV_VARS
        .iter()
        .any(|var| std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false));
    ci || !io::stdin().is_terminal()
}

/// Ask before spending money.
///
/// Returns `true` when the run may proceed: the caller passed `--yes`, the
/// session is non-interactive, the estimate does not exceed `threshold`, or
/// the user answered yes.
pub fn confirm_cost(
    chain: &str,
    estimate: &CostEstimate,
    threshold: f64,
    assume_yes: bool,
    interactive: bool,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> io::Result<bool> {
    if assume_yes || !interactive || estimate.total_cost <= threshold {
        return Ok(true);
    }

    writeln!(output, "{}", format_estimate(chain, estimate))?;
    write!(
        output,
        "Estimated cost ${:.2} exceeds ${:.2}. Continue? [y/N] ",
        estimate.total_cost, threshold
    )?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
