//! Chain executor: drives a chain's enabled steps one at a time, threading
//! each step's output into the next and stopping at the first failure.

use std::path::PathBuf;
use std::sync::Arc;

use sf_core::RunId;

use crate::chain::Chain;
use crate::context::StepContext;
use crate::fanout::DEFAULT_MAX_WORKERS;
use crate::input::StepInput;
use crate::registry::ExecutorRegistry;
use crate::result::{ChainResult, FailedStep};
use crate::step::Params;
use crate::stream::StreamEmitter;

/// Runs chains against an executor registry.
#[derive(Debug, Clone)]
pub struct ChainExecutor {
    registry: Arc<ExecutorRegistry>,
    output_dir: PathBuf,
    default_max_workers: usize,
    overrides: Params,
}

impl ChainExecutor {
    pub fn new(registry: Arc<ExecutorRegistry>) -> Self {
        Self {
            registry,
            output_dir: PathBuf::from("./output"),
            default_max_workers: DEFAULT_MAX_WORKERS,
            overrides: Params::new(),
        }
    }

    /// Output directory for chains that do not name their own.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_default_max_workers(mut self, workers: usize) -> Self {
        self.default_max_workers = workers.max(1);
        self
    }

    /// Caller-supplied params, lowest priority for every step.
    pub fn with_overrides(mut self, overrides: Params) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Execute `chain`.
    ///
    /// `input` feeds the first enabled step; when `None` it is resolved from
    /// the chain config.
    ///
    /// # Errors
    ///
    /// Returns [`sf_core::Error::Validation`] before any step runs when the
    /// chain is invalid or no initial input can be resolved, and
    /// [`sf_core::Error::Io`] when the output directory cannot be created.
    /// Step failures are not errors: they end the run and are reported in the
    /// returned [`ChainResult`].
    pub async fn execute_chain(
        &self,
        chain: &Chain,
        input: Option<StepInput>,
        emitter: &dyn StreamEmitter,
    ) -> sf_core::Result<ChainResult> {
        let problems = chain.validate();
        if !problems.is_empty() {
            return Err(sf_core::Error::Validation(format!(
                "chain '{}' is invalid: {}",
                chain.name,
                problems.join("; ")
            )));
        }

        let initial = match input.filter(|i| !i.is_none()) {
            Some(input) => input,
            None => chain.initial_input().ok_or_else(|| {
                sf_core::Error::Validation(format!(
                    "chain '{}' needs an initial {} input: supply one or set it in the chain config",
                    chain.name,
                    chain
                        .initial_input_type()
                        .map(|k| k.to_string())
                        .unwrap_or_else(|| "unknown".into())
                ))
            })?,
        };

        let output_dir = chain
            .config
            .output_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.clone());
        tokio::fs::create_dir_all(&output_dir).await?;

        let steps = chain.enabled_steps();
        let total = steps.len();
        let run_id = RunId::new();
        let mut result = ChainResult::new(run_id, &chain.name, total);

        tracing::info!(
            run = %run_id.short(),
            chain = %chain.name,
            steps = total,
            input = %initial.describe(),
            "Starting chain"
        );
        emitter.pipeline_start(
            run_id,
            &chain.name,
            total,
            chain.source.as_ref().map(|p| p.display().to_string()),
        );

        let base_ctx = StepContext::new(&chain.name, &output_dir)
            .with_run_id(run_id)
            .with_overrides(self.overrides.clone())
            .with_default_max_workers(self.default_max_workers);

        let mut current = initial;
        for (index, step) in steps.into_iter().enumerate() {
            let step_input = match &step.input_from {
                Some(source) => result
                    .outputs
                    .get(source)
                    .map(|r| r.next_input())
                    .unwrap_or_default(),
                None => current.clone(),
            };

            tracing::info!(
                "[{}/{}] {} ({}, model {})",
                index + 1,
                total,
                step.name,
                step.step_type,
                step.model
            );
            emitter.step_start(index, &step.step_type, &step.model);

            let ctx = base_ctx.clone().with_step(index, total);
            let step_result = self
                .registry
                .execute(step, &step_input, &chain.config, &ctx)
                .await;

            result.total_cost += step_result.cost;
            result.total_time += step_result.processing_time;

            if step_result.success {
                if let Some(warning) = &step_result.error {
                    tracing::warn!(step = %step.name, "Completed with item failures: {warning}");
                }
                tracing::info!(
                    step = %step.name,
                    cost = step_result.cost,
                    seconds = step_result.processing_time,
                    "Step completed"
                );
                emitter.step_complete(
                    index,
                    step_result.cost,
                    step_result.primary_output(),
                    step_result.processing_time,
                );
                current = step_result.next_input();
                result.outputs.insert(step.name.clone(), step_result);
                result.steps_completed += 1;
                continue;
            }

            let error = step_result
                .error
                .clone()
                .unwrap_or_else(|| "step failed".to_string());
            tracing::error!(step = %step.name, "Step failed: {error}");
            emitter.step_error(index, &step.step_type, &error);
            result.error = Some(format!("step '{}' ({}) failed: {error}", step.name, step.step_type));
            result.failed_step = Some(FailedStep {
                index,
                name: step.name.clone(),
                result: step_result,
            });
            break;
        }

        result.success = result.failed_step.is_none() && result.steps_completed == total;
        tracing::info!(
            run = %run_id.short(),
            success = result.success,
            completed = result.steps_completed,
            total,
            cost = result.total_cost,
            "Chain finished"
        );
        emitter.pipeline_complete(&result);
        Ok(result)
    }
}
