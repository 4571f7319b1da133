//! Execution context handed to every executor invocation.

use std::path::PathBuf;

use sf_core::RunId;

use crate::step::Params;

/// Per-step context. Read-only for executors.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub run_id: RunId,
    pub chain_name: String,
    /// 0-based position among the chain's enabled steps.
    pub step_index: usize,
    pub total_steps: usize,
    /// Directory executors write their outputs into.
    pub output_dir: PathBuf,
    /// Caller-supplied params; lowest priority in param resolution.
    pub overrides: Params,
    /// Fan-out pool size when a step asks for parallelism without naming one.
    pub default_max_workers: usize,
}

impl StepContext {
    /// Create a context for the first step of a run.
    pub fn new(chain_name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_id: RunId::new(),
            chain_name: chain_name.into(),
            step_index: 0,
            total_steps: 1,
            output_dir: output_dir.into(),
            overrides: Params::new(),
            default_max_workers: crate::fanout::DEFAULT_MAX_WORKERS,
        }
    }

    /// Builder: attach the run identifier.
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    /// Builder: position within the chain.
    pub fn with_step(mut self, index: usize, total: usize) -> Self {
        self.step_index = index;
        self.total_steps = total;
        self
    }

    /// Builder: caller-supplied param overrides.
    pub fn with_overrides(mut self, overrides: Params) -> Self {
        self.overrides = overrides;
        self
    }

    /// Builder: default fan-out pool size.
    pub fn with_default_max_workers(mut self, workers: usize) -> Self {
        self.default_max_workers = workers.max(1);
        self
    }
}
