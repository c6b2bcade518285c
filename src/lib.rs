// src/lib.rs
//
// Multi-source detection fusion and streaming-frame pipeline: several
// detectors per frame, one de-duplicated annotated output stream.

pub mod adapter;
pub mod annotator;
pub mod config;
pub mod error;
pub mod fusion;
pub mod pipeline;
pub mod segmentation;
pub mod sink;
pub mod source;
pub mod tracker;
pub mod types;

pub use adapter::{DetectorAdapter, ScriptedAdapter};
pub use annotator::FrameAnnotator;
pub use error::{PipelineError, Result};
pub use fusion::DetectionMerger;
pub use pipeline::{PipelineController, PipelineEvent, PipelineState};
pub use segmentation::{ClassMap, SegmentationAdapter, SegmentationOverlay};
pub use sink::{FrameReceiver, FrameSink, PushOutcome};
pub use source::{FrameSource, SourceProvider, SyntheticProvider, SyntheticSource};
pub use tracker::MotionTracker;
pub use types::{
    Config, Detection, Frame, FusedDetection, MergePolicy, RenderedFrame, TrackedDetection,
};
