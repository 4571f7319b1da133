//! Bounded fan-out within a single step.
//!
//! A fixed pool of worker tasks drains a shared queue of `(index, item)`
//! pairs. Each worker writes its outcome into the slot for that index, so the
//! aggregated outputs always follow the original input order regardless of
//! which worker finished first. A failing or panicking item never affects its
//! siblings.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinSet;

use crate::executor::panic_message;
use crate::result::StepResult;
use crate::step::{param_bool, param_str_list, param_usize, Params};

/// Pool size used when parallel mode is requested without `max_workers`.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Fan-out options read from step params.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutSettings {
    pub parallel: bool,
    pub max_workers: usize,
    /// Per-item prompts; items past the end fall back to the step prompt.
    pub prompts: Vec<String>,
}

impl FanOutSettings {
    /// Read `parallel`, `max_workers` and `prompts` from resolved params.
    ///
    /// `parallel_default` applies when the params do not say; a zero or
    /// unparsable `max_workers` falls back to `default_workers`.
    pub fn from_params(params: &Params, parallel_default: bool, default_workers: usize) -> Self {
        let max_workers = param_usize(params, "max_workers")
            .filter(|n| *n > 0)
            .unwrap_or(default_workers)
            .max(1);
        Self {
            parallel: param_bool(params, "parallel").unwrap_or(parallel_default),
            max_workers,
            prompts: param_str_list(params, "prompts").unwrap_or_default(),
        }
    }

    /// Number of workers to spawn for `items` items.
    pub fn workers_for(&self, items: usize) -> usize {
        if self.parallel {
            self.max_workers.min(items).max(1)
        } else {
            1
        }
    }

    /// Prompt for item `index`, falling back to `default`.
    pub fn prompt_for(&self, index: usize, default: Option<&str>) -> Option<String> {
        self.prompts
            .get(index)
            .filter(|p| !p.trim().is_empty())
            .cloned()
            .or_else(|| default.map(str::to_string))
    }
}

/// Run `call` over every item with at most `workers` concurrent calls.
///
/// Returns one outcome per item, in input order. Panics inside `call` are
/// caught and reported as that item's error.
pub async fn run<T, R, F, Fut>(items: Vec<T>, workers: usize, call: F) -> Vec<Result<R, String>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, String>> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let queue: Arc<Mutex<VecDeque<(usize, T)>>> =
        Arc::new(Mutex::new(items.into_iter().enumerate().collect()));
    let slots: Arc<Mutex<Vec<Option<Result<R, String>>>>> =
        Arc::new(Mutex::new((0..total).map(|_| None).collect()));
    let call = Arc::new(call);

    let mut pool = JoinSet::new();
    for worker in 0..workers.clamp(1, total) {
        let queue = Arc::clone(&queue);
        let slots = Arc::clone(&slots);
        let call = Arc::clone(&call);
        pool.spawn(async move {
            loop {
                let next = queue.lock().pop_front();
                let Some((index, item)) = next else { break };
                tracing::debug!(worker, item = index + 1, "Fan-out item started");
                let outcome = match AssertUnwindSafe((*call)(index, item)).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
                };
                slots.lock()[index] = Some(outcome);
            }
        });
    }

    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Fan-out worker aborted: {e}");
        }
    }

    let mut slots = slots.lock();
    slots
        .iter_mut()
        .map(|slot| {
            slot.take()
                .unwrap_or_else(|| Err("item was not processed".to_string()))
        })
        .collect()
}

/// Combine per-item outcomes into one step result.
///
/// The step succeeds when at least one item succeeded. Its cost is the sum
/// over successful items only, and every failed item is named by its 1-based
/// position in `error`.
pub fn aggregate(outcomes: Vec<Result<StepResult, String>>, model: &str, elapsed: f64) -> StepResult {
    let total = outcomes.len();
    let mut combined = StepResult {
        success: true,
        processing_time: elapsed,
        model: model.to_string(),
        ..StepResult::default()
    };
    let mut errors = Vec::new();
    let mut failed_items = Vec::new();
    let mut texts = Vec::new();
    let mut succeeded = 0usize;
    let mut model_used: Option<String> = None;

    for (index, outcome) in outcomes.into_iter().enumerate() {
        let item = match outcome {
            Ok(item) if item.success => item,
            Ok(item) => {
                let reason = item.error.unwrap_or_else(|| "unknown error".into());
                errors.push(format!("Item {} failed: {reason}", index + 1));
                failed_items.push(index + 1);
                continue;
            }
            Err(reason) => {
                errors.push(format!("Item {} failed: {reason}", index + 1));
                failed_items.push(index + 1);
                continue;
            }
        };

        succeeded += 1;
        combined.cost += item.cost;
        model_used.get_or_insert(item.model.clone());
        combined.output_items.extend(item.media_outputs());
        if let Some(path) = item.output_path {
            combined.output_paths.push(path);
        } else if let Some(url) = item.output_url {
            combined.output_urls.push(url);
        }
        combined.output_paths.extend(item.output_paths);
        combined.output_urls.extend(item.output_urls);
        if let Some(text) = item.output_text {
            texts.push(text);
        }
    }

    combined.metadata.insert("items_total".into(), Value::from(total));
    combined.metadata.insert("items_succeeded".into(), Value::from(succeeded));
    if !failed_items.is_empty() {
        combined.metadata.insert("failed_items".into(), Value::from(failed_items));
    }

    if succeeded == 0 {
        let mut failed = StepResult::failure(model, errors.join("; "), elapsed);
        failed.metadata = combined.metadata;
        return failed;
    }

    if let Some(used) = model_used {
        combined.model = used;
    }
    if !texts.is_empty() {
        combined.output_text = Some(texts.join("\n\n"));
    }
    if !errors.is_empty() {
        combined.error = Some(errors.join("; "));
    }
    combined.checked()
}
