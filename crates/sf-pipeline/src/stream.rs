//! Streaming telemetry for chain runs.
//!
//! Events are newline-delimited JSON records. [`JsonlEmitter`] writes
//! `pipeline_complete` to the primary writer and every other event to the
//! side writer, so the primary channel stays a clean, pipeable artifact.
//! [`BroadcastEmitter`] fans records out over a `tokio::sync::broadcast`
//! channel for in-process subscribers.

use std::io::Write;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sf_core::{RunId, StepType};
use tokio::sync::broadcast;

use crate::result::ChainResult;

/// Version of the record layout below.
pub const SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// PipelineEvent
// ---------------------------------------------------------------------------

/// Lifecycle event of one chain run. Step indices are 0-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    PipelineStart {
        run_id: RunId,
        name: String,
        total_steps: usize,
        /// Where the chain came from (file path), if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config_ref: Option<String>,
    },
    StepStart {
        step_index: usize,
        step_type: StepType,
        model: String,
    },
    StepComplete {
        step_index: usize,
        cost: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_path: Option<String>,
        duration: f64,
    },
    StepError {
        step_index: usize,
        step_type: StepType,
        error: String,
    },
    PipelineComplete {
        result: ChainResult,
    },
}

impl PipelineEvent {
    /// Event name as it appears in the `event` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PipelineStart { .. } => "pipeline_start",
            Self::StepStart { .. } => "step_start",
            Self::StepComplete { .. } => "step_complete",
            Self::StepError { .. } => "step_error",
            Self::PipelineComplete { .. } => "pipeline_complete",
        }
    }

    /// Whether this event belongs on the primary channel.
    pub fn is_primary(&self) -> bool {
        matches!(self, Self::PipelineComplete { .. })
    }
}

/// One line of the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub schema_version: u32,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the emitter was created; monotonic.
    pub elapsed_seconds: f64,
    #[serde(flatten)]
    pub event: PipelineEvent,
}

// ---------------------------------------------------------------------------
// StreamEmitter
// ---------------------------------------------------------------------------

/// Telemetry sink. Every method is safe to call unconditionally.
pub trait StreamEmitter: Send + Sync {
    fn emit(&self, event: PipelineEvent);

    fn pipeline_start(&self, run_id: RunId, name: &str, total_steps: usize, config_ref: Option<String>) {
        self.emit(PipelineEvent::PipelineStart {
            run_id,
            name: name.to_string(),
            total_steps,
            config_ref,
        });
    }

    fn step_start(&self, step_index: usize, step_type: &StepType, model: &str) {
        self.emit(PipelineEvent::StepStart {
            step_index,
            step_type: step_type.clone(),
            model: model.to_string(),
        });
    }

    fn step_complete(&self, step_index: usize, cost: f64, output_path: Option<String>, duration: f64) {
        self.emit(PipelineEvent::StepComplete {
            step_index,
            cost,
            output_path,
            duration,
        });
    }

    fn step_error(&self, step_index: usize, step_type: &StepType, error: &str) {
        self.emit(PipelineEvent::StepError {
            step_index,
            step_type: step_type.clone(),
            error: error.to_string(),
        });
    }

    fn pipeline_complete(&self, result: &ChainResult) {
        self.emit(PipelineEvent::PipelineComplete {
            result: result.clone(),
        });
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmitter;

impl StreamEmitter for NullEmitter {
    fn emit(&self, _event: PipelineEvent) {}
}

/// Stamps events with wall-clock time and elapsed seconds.
#[derive(Debug, Clone, Copy)]
struct Clock {
    started: Instant,
}

impl Clock {
    fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    fn record(&self, event: PipelineEvent) -> StreamRecord {
        StreamRecord {
            schema_version: SCHEMA_VERSION,
            timestamp: Utc::now(),
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
            event,
        }
    }
}

// ---------------------------------------------------------------------------
// JsonlEmitter
// ---------------------------------------------------------------------------

type Sink = Mutex<Box<dyn Write + Send>>;

/// Writes one JSON object per line to a primary and a side writer.
pub struct JsonlEmitter {
    clock: Clock,
    primary: Sink,
    side: Sink,
}

impl JsonlEmitter {
    pub fn new(primary: Box<dyn Write + Send>, side: Box<dyn Write + Send>) -> Self {
        Self {
            clock: Clock::new(),
            primary: Mutex::new(primary),
            side: Mutex::new(side),
        }
    }

    /// `pipeline_complete` to stdout, everything else to stderr.
    pub fn stdio() -> Self {
        Self::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()))
    }
}

impl StreamEmitter for JsonlEmitter {
    fn emit(&self, event: PipelineEvent) {
        let sink = if event.is_primary() { &self.primary } else { &self.side };
        let name = event.name();
        let line = match serde_json::to_string(&self.clock.record(event)) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to encode {name} event: {e}");
                return;
            }
        };
        let mut writer = sink.lock();
        if let Err(e) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
            tracing::warn!("Failed to write {name} event: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// BroadcastEmitter
// ---------------------------------------------------------------------------

/// Publishes records on a broadcast channel.
///
/// Records emitted while nobody is subscribed are dropped.
pub struct BroadcastEmitter {
    clock: Clock,
    tx: broadcast::Sender<StreamRecord>,
}

impl BroadcastEmitter {
    /// `capacity` is the channel buffer; lagging receivers lose the oldest
    /// records.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            clock: Clock::new(),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamRecord> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

impl StreamEmitter for BroadcastEmitter {
    fn emit(&self, event: PipelineEvent) {
        let _ = self.tx.send(self.clock.record(event));
    }
}
