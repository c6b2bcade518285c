// tests/pipeline.rs
//
// End-to-end run: synthetic stream in, annotated frames out, with two
// detectors that report the same moving object and fusion collapsing
// them to one.

use robosight::types::{Config, Detection};
use robosight::{
    Frame, FrameSource, MergePolicy, PipelineController, PipelineState, ScriptedAdapter,
    SyntheticProvider,
};
use std::time::Duration;

fn fast_config() -> Config {
    let mut config = Config::default();
    config.video.display_size = None;
    config
}

fn moving_pair(frames: usize) -> (ScriptedAdapter, ScriptedAdapter) {
    // Both adapters see the same object with slightly different boxes
    let a = ScriptedAdapter::drifting_box("model-a", "fox", Some(1), [20, 20, 80, 80], 4, frames);
    let b = ScriptedAdapter::drifting_box("model-b", "fox", Some(1), [24, 24, 84, 84], 4, frames);
    (a, b)
}

#[test]
fn full_run_fuses_and_preserves_frame_order() {
    let provider = SyntheticProvider::new(160, 120, 1000.0);
    let (mut controller, rx) = PipelineController::new(fast_config(), Box::new(provider)).unwrap();
    let (a, b) = moving_pair(10);
    controller.add_adapter(Box::new(a));
    controller.add_adapter(Box::new(b));

    controller.start("synthetic:10").unwrap();

    let mut last_id = 0;
    let mut last_timestamp = 0.0;
    let mut received = 0;
    while let Some(rendered) = rx.recv_timeout(Duration::from_secs(2)) {
        // Source order, never reordered
        assert!(rendered.frame_id > last_id);
        assert!(rendered.frame.timestamp_ms > last_timestamp);
        last_id = rendered.frame_id;
        last_timestamp = rendered.frame.timestamp_ms;

        // Two raw reports of the same fox collapse to one object
        assert_eq!(rendered.detection_count, 1);
        received += 1;
    }
    assert!(received >= 1);

    // Wait for the worker to settle back to Idle
    for _ in 0..100 {
        if controller.state() == PipelineState::Idle {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(controller.state(), PipelineState::Idle);

    let summary = controller.metrics().summary();
    assert_eq!(summary.total_frames, 10);
    assert_eq!(summary.raw_detections, 20);
    assert_eq!(summary.fused_detections, 10);
}

#[test]
fn keep_best_policy_flows_through_the_pipeline() {
    let mut config = fast_config();
    config.fusion.merge_policy = MergePolicy::KeepBest;

    let provider = SyntheticProvider::new(160, 120, 1000.0);
    let (mut controller, rx) = PipelineController::new(config, Box::new(provider)).unwrap();
    let (a, b) = moving_pair(5);
    controller.add_adapter(Box::new(a));
    controller.add_adapter(Box::new(b));

    controller.start("synthetic:5").unwrap();
    let mut saw_single = false;
    while let Some(rendered) = rx.recv_timeout(Duration::from_secs(2)) {
        assert_eq!(rendered.detection_count, 1);
        saw_single = true;
    }
    assert!(saw_single);
}

#[test]
fn slow_consumer_sheds_frames_instead_of_stalling() {
    let mut config = fast_config();
    config.sink.capacity = 1;

    let provider = SyntheticProvider::new(64, 64, 1000.0);
    let (mut controller, rx) = PipelineController::new(config, Box::new(provider)).unwrap();
    controller.add_adapter(Box::new(ScriptedAdapter::new("quiet", vec![])));

    controller.start("synthetic:50").unwrap();

    // Do not consume until the run is over
    for _ in 0..300 {
        if controller.state() == PipelineState::Idle {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(controller.state(), PipelineState::Idle);

    let summary = controller.metrics().summary();
    // Every frame was processed; the overflow was shed, not queued
    assert_eq!(summary.total_frames, 50);
    assert_eq!(summary.frames_dropped, 49);
    assert!(rx.try_recv().is_some());
    assert!(rx.try_recv().is_none());

    let dropped_events = controller
        .drain_events()
        .iter()
        .filter(|e| matches!(e, robosight::PipelineEvent::FrameDropped { .. }))
        .count();
    assert!(dropped_events >= 1);
}

#[test]
fn stopped_run_clears_tracking_state_for_the_next_one() {
    let provider = SyntheticProvider::new(64, 64, 1000.0);
    let (mut controller, rx) = PipelineController::new(fast_config(), Box::new(provider)).unwrap();
    controller.add_adapter(Box::new(ScriptedAdapter::new(
        "one-shot",
        vec![vec![Detection {
            bbox: [5, 5, 25, 25],
            score: 0.9,
            label: "stone".to_string(),
            track_id: Some(99),
            source_index: 0,
        }]],
    )));

    controller.start("synthetic:1").unwrap();
    assert!(rx.recv_timeout(Duration::from_secs(2)).is_some());
    for _ in 0..100 {
        if controller.state() == PipelineState::Idle {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    // A second run starts cleanly from Idle
    controller.start("synthetic:1").unwrap();
    while rx.recv_timeout(Duration::from_secs(2)).is_some() {}
    for _ in 0..100 {
        if controller.state() == PipelineState::Idle {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(controller.state(), PipelineState::Idle);
}

#[test]
fn annotated_output_differs_from_raw_frames() {
    let provider = SyntheticProvider::new(64, 64, 1000.0);
    let (mut controller, rx) = PipelineController::new(fast_config(), Box::new(provider)).unwrap();
    controller.add_adapter(Box::new(ScriptedAdapter::new(
        "boxed",
        (0..3)
            .map(|_| {
                vec![Detection {
                    bbox: [10, 10, 50, 50],
                    score: 0.9,
                    label: "bush".to_string(),
                    track_id: None,
                    source_index: 0,
                }]
            })
            .collect(),
    )));

    controller.start("synthetic:3").unwrap();

    let rendered = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    let mut raw = robosight::SyntheticSource::new(64, 64, 1000.0, 3);
    let mut raw_frame: Option<Frame> = None;
    for _ in 0..rendered.frame_id {
        raw_frame = raw.read_frame().unwrap();
    }
    assert_ne!(rendered.frame.data, raw_frame.unwrap().data);

    controller.stop();
}
