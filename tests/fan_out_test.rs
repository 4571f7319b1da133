//! Bounded fan-out inside a single step.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::{file_reply, harness, FakeGenerator};
use sf_core::StepType;
use sf_pipeline::{Chain, NullEmitter, StepInput};

fn images(n: usize) -> StepInput {
    StepInput::Many(
        (1..=n)
            .map(|i| StepInput::Path(PathBuf::from(format!("/frames/{i}.png"))))
            .collect(),
    )
}

fn animate_chain(params: &str) -> Chain {
    Chain::from_yaml(&format!(
        r#"
name: animate
steps:
  - name: animate
    type: image_to_video
    model: hailuo
    params: {params}
"#
    ))
    .unwrap()
}

#[tokio::test]
async fn one_panicking_item_does_not_sink_the_step() {
    let video = Arc::new(
        FakeGenerator::new(|req| {
            if req.item_index == Some(1) {
                panic!("decoder crashed");
            }
            Ok(file_reply(req, "mp4", 0.27))
        })
        .with_delay(Duration::from_millis(30)),
    );
    let h = harness(&[(StepType::ImageToVideo, video.clone())]);
    let chain = animate_chain("{ parallel: true, max_workers: 2 }");

    let result = h
        .executor
        .execute_chain(&chain, Some(images(4)), &NullEmitter)
        .await
        .unwrap();

    assert!(result.success, "{:?}", result.error);
    let step = result.output("animate").unwrap();
    assert!(step.success);
    assert_eq!(
        step.output_paths,
        vec![
            h.dir.path().join("animate_01.mp4"),
            h.dir.path().join("animate_03.mp4"),
            h.dir.path().join("animate_04.mp4"),
        ]
    );
    let error = step.error.as_deref().unwrap();
    assert!(error.contains("Item 2"), "{error}");
    assert!(error.contains("decoder crashed"), "{error}");
    assert!((step.cost - 3.0 * 0.27).abs() < 1e-9);

    assert_eq!(video.calls(), 4);
    assert!(video.peak_concurrency() <= 2);
}

#[tokio::test]
async fn worker_bound_is_respected() {
    let video = Arc::new(
        FakeGenerator::succeeding("mp4", 0.1).with_delay(Duration::from_millis(40)),
    );
    let h = harness(&[(StepType::ImageToVideo, video.clone())]);
    let chain = animate_chain("{ parallel: true, max_workers: 3 }");

    let result = h
        .executor
        .execute_chain(&chain, Some(images(8)), &NullEmitter)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.output("animate").unwrap().output_paths.len(), 8);
    assert!(video.peak_concurrency() <= 3);
    assert!(video.peak_concurrency() >= 2);
}

#[tokio::test]
async fn sequential_unless_parallel_is_set() {
    let video = Arc::new(
        FakeGenerator::succeeding("mp4", 0.1).with_delay(Duration::from_millis(10)),
    );
    let h = harness(&[(StepType::ImageToVideo, video.clone())]);
    let chain = animate_chain("{ max_workers: 4 }");

    let result = h
        .executor
        .execute_chain(&chain, Some(images(3)), &NullEmitter)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(video.peak_concurrency(), 1);
}

#[tokio::test]
async fn per_item_prompts_follow_input_order() {
    let video = Arc::new(FakeGenerator::succeeding("mp4", 0.1));
    let h = harness(&[(StepType::ImageToVideo, video.clone())]);
    let chain = animate_chain("{ parallel: true, prompts: [pan left, zoom in, pan right] }");

    h.executor
        .execute_chain(&chain, Some(images(3)), &NullEmitter)
        .await
        .unwrap();

    let mut requests = video.requests();
    requests.sort_by_key(|r| r.item_index);
    let prompts: Vec<_> = requests.iter().map(|r| r.prompt.clone().unwrap()).collect();
    assert_eq!(prompts, vec!["pan left", "zoom in", "pan right"]);
}

#[tokio::test]
async fn every_item_failing_fails_the_chain() {
    let video = Arc::new(FakeGenerator::failing("rate limited"));
    let h = harness(&[(StepType::ImageToVideo, video)]);
    let chain = animate_chain("{ parallel: true }");

    let result = h
        .executor
        .execute_chain(&chain, Some(images(2)), &NullEmitter)
        .await
        .unwrap();

    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("Item 1 failed: rate limited"), "{error}");
    assert!(error.contains("Item 2 failed: rate limited"), "{error}");
}

#[tokio::test]
async fn parallel_group_runs_members_side_by_side() {
    let video = Arc::new(
        FakeGenerator::succeeding("mp4", 0.18).with_delay(Duration::from_millis(40)),
    );
    let upscale = Arc::new(
        FakeGenerator::succeeding("png", 0.08).with_delay(Duration::from_millis(40)),
    );
    let h = harness(&[
        (StepType::ImageToVideo, video.clone()),
        (StepType::UpscaleImage, upscale.clone()),
    ]);

    let chain = Chain::from_yaml(
        r#"
name: variants
input_image: /frames/hero.png
steps:
  - name: variants
    type: parallel_group
    params:
      steps:
        - { name: motion, type: image_to_video, model: seedance }
        - { name: sharp, type: upscale_image, model: topaz }
"#,
    )
    .unwrap();

    let result = h
        .executor
        .execute_chain(&chain, None, &NullEmitter)
        .await
        .unwrap();

    assert!(result.success, "{:?}", result.error);
    let group = result.output("variants").unwrap();
    assert_eq!(
        group.output_paths,
        vec![h.dir.path().join("motion.mp4"), h.dir.path().join("sharp.png")]
    );
    assert!((result.total_cost - 0.26).abs() < 1e-9);
    assert_eq!(video.calls(), 1);
    assert_eq!(upscale.calls(), 1);
}
