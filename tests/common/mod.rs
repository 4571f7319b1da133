//! Shared test harness for integration tests.
//!
//! Provides [`FakeGenerator`], a scripted in-process provider that records
//! every request and tracks how many calls overlap, and [`harness`] which
//! wires a set of them into a [`ChainExecutor`] writing into a temp dir.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sf_core::{PricingTable, StepType};
use sf_pipeline::{
    ChainExecutor, ExecutorRegistry, GenerationRequest, GenerationResponse, Generator,
    GeneratorSet,
};
use tempfile::TempDir;

type Script = dyn Fn(&GenerationRequest) -> sf_core::Result<GenerationResponse> + Send + Sync;

/// A provider whose replies come from a closure.
pub struct FakeGenerator {
    script: Box<Script>,
    delay: Duration,
    requests: Mutex<Vec<GenerationRequest>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeGenerator {
    pub fn new(
        script: impl Fn(&GenerationRequest) -> sf_core::Result<GenerationResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Answers every request with `<output_dir>/<output_name>.<ext>` at `cost`.
    pub fn succeeding(ext: &'static str, cost: f64) -> Self {
        Self::new(move |req| Ok(file_reply(req, ext, cost)))
    }

    /// Reports every request as a provider failure.
    pub fn failing(message: &'static str) -> Self {
        Self::new(move |_| Ok(GenerationResponse::failed(message)))
    }

    /// Hold each call open for `delay` so overlapping calls can be observed.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// Highest number of calls that were in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, request: GenerationRequest) -> sf_core::Result<GenerationResponse> {
        self.requests.lock().push(request.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.active);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(&request)
    }
}

/// A successful reply pointing at a file named after the request.
pub fn file_reply(req: &GenerationRequest, ext: &str, cost: f64) -> GenerationResponse {
    let mut reply =
        GenerationResponse::with_path(req.output_dir.join(format!("{}.{}", req.output_name, ext)));
    reply.cost_estimate = Some(cost);
    reply
}

/// A chain executor backed by `generators`, writing into a fresh temp dir.
pub struct Harness {
    pub executor: ChainExecutor,
    pub dir: TempDir,
}

pub fn harness(generators: &[(StepType, Arc<FakeGenerator>)]) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let set: GeneratorSet = generators
        .iter()
        .map(|(step_type, generator)| {
            let generator: Arc<dyn Generator> = generator.clone();
            (step_type.clone(), generator)
        })
        .collect();
    let registry = ExecutorRegistry::from_generators(&set, PricingTable::builtin());
    let executor = ChainExecutor::new(Arc::new(registry)).with_output_dir(dir.path());
    Harness { executor, dir }
}
