//! `parallel_group`: run several independent sub-steps on the same input.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use sf_core::StepType;

use crate::chain::ChainConfig;
use crate::context::StepContext;
use crate::executor::{resolve_params, StepExecutor};
use crate::fanout::{self, FanOutSettings};
use crate::input::StepInput;
use crate::registry::ExecutorRegistry;
use crate::result::StepResult;
use crate::step::{Params, Step};

/// Params that configure the group itself rather than its members.
const GROUP_KEYS: [&str; 3] = ["steps", "parallel", "max_workers"];

/// Parse the `steps` param of a group, naming unnamed members
/// `<group>_<n>_<type>`.
pub fn group_members(group: &Step) -> sf_core::Result<Vec<Step>> {
    let Some(raw) = group.params.get("steps") else {
        return Err(sf_core::Error::Validation(format!(
            "parallel_group '{}' has no steps",
            group.name
        )));
    };
    let mut members: Vec<Step> = serde_json::from_value(raw.clone()).map_err(|e| {
        sf_core::Error::Validation(format!("parallel_group '{}' steps: {e}", group.name))
    })?;
    for (index, member) in members.iter_mut().enumerate() {
        if member.name.trim().is_empty() {
            member.name = format!("{}_{}_{}", group.name, index + 1, member.step_type);
        }
    }
    Ok(members)
}

/// Fans one input out to every member step through the leaf registry.
pub struct ParallelGroupExecutor {
    members: Arc<ExecutorRegistry>,
}

impl ParallelGroupExecutor {
    /// `members` resolves member steps; it must not itself contain a group
    /// executor.
    pub fn new(members: Arc<ExecutorRegistry>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl StepExecutor for ParallelGroupExecutor {
    fn step_type(&self) -> StepType {
        StepType::ParallelGroup
    }

    async fn run(
        &self,
        step: &Step,
        input: &StepInput,
        chain: &ChainConfig,
        ctx: &StepContext,
    ) -> sf_core::Result<StepResult> {
        let started = Instant::now();
        let members: Vec<Step> = group_members(step)?
            .into_iter()
            .filter(|m| m.enabled)
            .collect();
        if members.is_empty() {
            return Err(sf_core::Error::Validation(format!(
                "parallel_group '{}' has no enabled steps",
                step.name
            )));
        }

        let params = resolve_params(step, chain, &ctx.overrides, &[]);
        let settings = FanOutSettings::from_params(&params, true, ctx.default_max_workers);
        let shared: Params = params
            .into_iter()
            .filter(|(key, _)| !GROUP_KEYS.contains(&key.as_str()))
            .collect();

        let names: Vec<Value> = members.iter().map(|m| Value::from(m.name.clone())).collect();
        tracing::info!(
            step = %step.name,
            members = members.len(),
            workers = settings.workers_for(members.len()),
            "Running parallel group"
        );

        let registry = Arc::clone(&self.members);
        let input = input.clone();
        let chain = chain.clone();
        let member_ctx = ctx.clone().with_overrides(shared);
        let workers = settings.workers_for(members.len());
        let outcomes = fanout::run(members, workers, move |_, member| {
            let registry = Arc::clone(&registry);
            let input = input.clone();
            let chain = chain.clone();
            let ctx = member_ctx.clone();
            async move { Ok(registry.execute(&member, &input, &chain, &ctx).await) }
        })
        .await;

        let mut result = fanout::aggregate(outcomes, &step.model, started.elapsed().as_secs_f64());
        result.metadata.insert("members".into(), Value::from(names));
        Ok(result)
    }
}
