// src/types.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub fusion: FusionConfig,
    pub tracking: TrackingConfig,
    pub video: VideoConfig,
    pub sink: SinkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Overlap threshold τ: boxes with IoU strictly above this merge
    pub iou_threshold: f32,
    pub merge_policy: MergePolicy,
    /// When true, detections with different labels are never merged
    pub label_scoped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Frames are shrunk to this size before adapter fan-out (native if absent)
    pub processing_size: Option<FrameSize>,
    /// Annotated frames are resized to this size before handoff to the sink
    pub display_size: Option<FrameSize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Bounded channel depth; pushes are skipped when full
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Conflict-resolution policy applied when two detections exceed τ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Grow the surviving box to the union of both, keep the max score
    UnionBox,
    /// Keep whichever detection scored higher, discard the other entirely
    KeepBest,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fusion: FusionConfig {
                iou_threshold: 0.5,
                merge_policy: MergePolicy::UnionBox,
                label_scoped: false,
            },
            tracking: TrackingConfig { enabled: true },
            video: VideoConfig {
                processing_size: None,
                display_size: Some(FrameSize {
                    width: 800,
                    height: 450,
                }),
            },
            sink: SinkConfig { capacity: 3 },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

/// One decoded video frame: dense HxWx3, 8-bit RGB
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

impl Frame {
    pub fn new(width: usize, height: usize, timestamp_ms: f64) -> Self {
        Self {
            data: vec![0u8; width * height * 3],
            width,
            height,
            timestamp_ms,
        }
    }
}

/// Raw detection from a single adapter, valid for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// [x1, y1, x2, y2] pixel corners, x1 < x2 and y1 < y2
    pub bbox: [i32; 4],
    /// Confidence in [0, 1]
    pub score: f32,
    pub label: String,
    /// Stable identity assigned by the adapter's internal tracker, if any
    pub track_id: Option<i64>,
    /// Which adapter produced this detection
    pub source_index: usize,
}

impl Detection {
    pub fn centroid(&self) -> (f32, f32) {
        (
            (self.bbox[0] + self.bbox[2]) as f32 / 2.0,
            (self.bbox[1] + self.bbox[3]) as f32 / 2.0,
        )
    }

    /// Box area in pixels, inclusive corners
    pub fn area_px(&self) -> i64 {
        let w = (self.bbox[2] - self.bbox[0] + 1) as i64;
        let h = (self.bbox[3] - self.bbox[1] + 1) as i64;
        w * h
    }
}

/// Result of collapsing one or more raw detections into a single object
#[derive(Debug, Clone, PartialEq)]
pub struct FusedDetection {
    pub bbox: [i32; 4],
    pub score: f32,
    pub label: String,
    pub track_id: Option<i64>,
    pub source_index: usize,
    /// How many raw detections contributed
    pub merge_count: usize,
}

impl FusedDetection {
    pub fn from_detection(d: Detection) -> Self {
        Self {
            bbox: d.bbox,
            score: d.score,
            label: d.label,
            track_id: d.track_id,
            source_index: d.source_index,
            merge_count: 1,
        }
    }

    pub fn centroid(&self) -> (f32, f32) {
        (
            (self.bbox[0] + self.bbox[2]) as f32 / 2.0,
            (self.bbox[1] + self.bbox[3]) as f32 / 2.0,
        )
    }

    pub fn area_px(&self) -> i64 {
        let w = (self.bbox[2] - self.bbox[0] + 1) as i64;
        let h = (self.bbox[3] - self.bbox[1] + 1) as i64;
        w * h
    }
}

/// Fused detection with motion info attached by the tracker
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedDetection {
    pub fused: FusedDetection,
    /// Pixels per second; None when the detection carries no track id
    pub speed: Option<f64>,
}

/// Finished frame handed to the display sink
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub frame_id: u64,
    pub frame: Frame,
    pub detection_count: usize,
}
