//! Lifecycle telemetry emitted while a chain runs.

mod common;

use std::io::Write;
use std::sync::Arc;

use common::{harness, FakeGenerator};
use parking_lot::Mutex;
use serde_json::Value;
use sf_core::StepType;
use sf_pipeline::{BroadcastEmitter, Chain, JsonlEmitter, PipelineEvent};

#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Buffer {
    fn records(&self) -> Vec<Value> {
        String::from_utf8(self.0.lock().clone())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

fn two_step_chain() -> Chain {
    Chain::from_yaml(
        r#"
name: telemetry
prompt: a comet
steps:
  - { name: keyframe, type: text_to_image, model: flux_dev }
  - { name: clip, type: image_to_video, model: hailuo }
"#,
    )
    .unwrap()
}

#[tokio::test]
async fn jsonl_keeps_the_result_alone_on_the_primary_channel() {
    let h = harness(&[
        (StepType::TextToImage, Arc::new(FakeGenerator::succeeding("png", 0.003))),
        (StepType::ImageToVideo, Arc::new(FakeGenerator::failing("no credit"))),
    ]);
    let (primary, side) = (Buffer::default(), Buffer::default());
    let emitter = JsonlEmitter::new(Box::new(primary.clone()), Box::new(side.clone()));

    let result = h
        .executor
        .execute_chain(&two_step_chain(), None, &emitter)
        .await
        .unwrap();
    assert!(!result.success);

    let side = side.records();
    let events: Vec<&str> = side.iter().map(|r| r["event"].as_str().unwrap()).collect();
    assert_eq!(
        events,
        vec!["pipeline_start", "step_start", "step_complete", "step_start", "step_error"]
    );
    assert_eq!(side[0]["name"], "telemetry");
    assert_eq!(side[0]["total_steps"], 2);
    assert_eq!(side[1]["step_index"], 0);
    assert_eq!(side[1]["model"], "flux_dev");
    assert_eq!(side[2]["cost"], 0.003);
    assert_eq!(side[4]["step_index"], 1);
    assert_eq!(side[4]["step_type"], "image_to_video");
    assert!(side[4]["error"].as_str().unwrap().contains("no credit"));
    assert!(side.iter().all(|r| r["schema_version"] == 1));

    let primary = primary.records();
    assert_eq!(primary.len(), 1);
    assert_eq!(primary[0]["event"], "pipeline_complete");
    assert_eq!(primary[0]["result"]["success"], false);
    assert_eq!(primary[0]["result"]["steps_completed"], 1);
}

#[tokio::test]
async fn broadcast_subscribers_see_every_event_in_order() {
    let h = harness(&[
        (StepType::TextToImage, Arc::new(FakeGenerator::succeeding("png", 0.003))),
        (StepType::ImageToVideo, Arc::new(FakeGenerator::succeeding("mp4", 0.27))),
    ]);
    let emitter = BroadcastEmitter::new(64);
    let mut rx = emitter.subscribe();

    let result = h
        .executor
        .execute_chain(&two_step_chain(), None, &emitter)
        .await
        .unwrap();
    assert!(result.success);

    let mut names = Vec::new();
    let mut last_elapsed = 0.0;
    while let Ok(record) = rx.try_recv() {
        assert!(record.elapsed_seconds >= last_elapsed);
        last_elapsed = record.elapsed_seconds;
        names.push(record.event.name());
        if let PipelineEvent::PipelineComplete { result: streamed } = &record.event {
            assert_eq!(streamed, &result);
        }
    }
    assert_eq!(
        names,
        vec![
            "pipeline_start",
            "step_start",
            "step_complete",
            "step_start",
            "step_complete",
            "pipeline_complete",
        ]
    );
}
