//! # sf-pipeline
//!
//! Orchestration of AI generation chains.
//!
//! This crate provides:
//!
//! - **[`Chain`] / [`Step`]** -- the declarative chain model, loaded from
//!   YAML or JSON, with structural validation.
//! - **[`StepExecutor`]** -- one executor per step type, normalising a
//!   [`Generator`]'s reply into a [`StepResult`]. Built-in executors live in
//!   [`executors`].
//! - **[`ExecutorRegistry`]** -- step-type lookup table, built once.
//! - **[`fanout`]** -- bounded worker pool for steps that process many
//!   independent items, with ordered results and per-item failure isolation.
//! - **[`ChainExecutor`]** -- runs a chain sequentially, stopping at the
//!   first failing step, and aggregates a [`ChainResult`].
//! - **[`stream`]** -- JSONL lifecycle telemetry.
//! - **[`estimate_chain_cost`]** -- static cost estimate for a chain.
//! - **[`HttpGenerator`]** -- generic JSON-over-HTTP provider adapter.

pub mod chain;
pub mod context;
pub mod cost;
pub mod executor;
pub mod executors;
pub mod fanout;
pub mod generator;
pub mod http;
pub mod input;
pub mod orchestrator;
pub mod registry;
pub mod result;
pub mod step;
pub mod stream;

// Re-export key types at the crate root.
pub use chain::{Chain, ChainConfig};
pub use context::StepContext;
pub use cost::{estimate_chain_cost, CostEstimate, StepEstimate};
pub use executor::{execute_step, StepExecutor};
pub use fanout::FanOutSettings;
pub use generator::{GenerationRequest, GenerationResponse, Generator};
pub use http::HttpGenerator;
pub use input::{MediaRef, StepInput};
pub use orchestrator::ChainExecutor;
pub use registry::{ExecutorRegistry, GeneratorSet};
pub use result::{ChainResult, FailedStep, StepResult};
pub use step::{Params, Step};
pub use stream::{BroadcastEmitter, JsonlEmitter, NullEmitter, PipelineEvent, StreamEmitter};
