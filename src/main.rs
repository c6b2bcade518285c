// src/main.rs
//
// Demo runner: a synthetic video stream, two overlapping scripted
// detectors and a scripted terrain segmenter, wired through the full
// pipeline. Real deployments plug in decoder-backed sources and
// model-backed adapters at the same trait boundaries.

use anyhow::Result;
use robosight::segmentation::{ClassMap, SegmentationAdapter, SegmentationOverlay};
use robosight::types::{Config, Detection, Frame};
use robosight::{PipelineController, PipelineState, ScriptedAdapter, SyntheticProvider};
use std::time::Duration;
use tracing::{info, warn};

const STREAM_FRAMES: u64 = 120;

/// Fake terrain model: splits the frame into a horizon band and ground
struct BandSegmenter;

impl SegmentationAdapter for BandSegmenter {
    fn name(&self) -> &str {
        "terrain-bands"
    }

    fn segment(&mut self, frame: &Frame) -> robosight::Result<ClassMap> {
        let width = 64.min(frame.width);
        let height = 64.min(frame.height);
        let classes = (0..width * height)
            .map(|i| if i / width < height / 3 { 0u8 } else { 1u8 })
            .collect();
        Ok(ClassMap {
            classes,
            width,
            height,
        })
    }
}

fn drifting(name: &str, track_id: i64, origin: [i32; 4], step: i32) -> ScriptedAdapter {
    ScriptedAdapter::drifting_box(
        name,
        name,
        Some(track_id),
        origin,
        step,
        STREAM_FRAMES as usize,
    )
}

fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("robosight={}", config.logging.level))
        .init();

    info!("RoboSight pipeline demo starting");

    let provider = SyntheticProvider::new(640, 360, 30.0);
    let (mut controller, receiver) = PipelineController::new(config, Box::new(provider))?;

    // Two detectors that mostly agree on the same object, plus an
    // independent one; fusion collapses the overlap per frame
    controller.add_adapter(Box::new(drifting("fox-a", 1, [40, 100, 120, 180], 3)));
    controller.add_adapter(Box::new(drifting("fox-b", 1, [44, 104, 124, 184], 3)));
    controller.add_adapter(Box::new(ScriptedAdapter::new(
        "tree",
        (0..STREAM_FRAMES)
            .map(|_| {
                vec![Detection {
                    bbox: [400, 60, 520, 300],
                    score: 0.82,
                    label: "tree".to_string(),
                    track_id: None,
                    source_index: 0,
                }]
            })
            .collect(),
    )));
    controller.set_segmentation(Box::new(BandSegmenter), SegmentationOverlay::new(2, 17));

    controller.start(&format!("synthetic:{}", STREAM_FRAMES))?;

    // Stand-in for the display surface: drain at the channel's pace
    let mut displayed = 0u64;
    while let Some(frame) = receiver.recv_timeout(Duration::from_secs(2)) {
        displayed += 1;
        if frame.frame_id % 30 == 0 {
            info!(
                "Frame {}: {} object(s), {}x{}",
                frame.frame_id, frame.detection_count, frame.frame.width, frame.frame.height
            );
        }
    }

    controller.stop();
    if controller.state() == PipelineState::Failed {
        warn!(
            "Run failed: {}",
            controller.last_error().unwrap_or_default()
        );
    }

    let summary = controller.metrics().summary();
    info!(
        "Done: {} frames processed, {} displayed, {} dropped, {:.1} fps, {} raw -> {} fused detections",
        summary.total_frames,
        displayed,
        summary.frames_dropped,
        summary.fps,
        summary.raw_detections,
        summary.fused_detections
    );
    for event in controller.drain_events() {
        info!("Event: {:?}", event);
    }

    Ok(())
}
