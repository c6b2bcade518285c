// src/source.rs
//
// Video source boundary. Real decoders (file, camera, RTSP) live outside
// this crate; the pipeline only sees a sequential frame stream with a
// reported frame rate. Release happens on drop.

use crate::error::{PipelineError, Result};
use crate::types::Frame;

/// An opened, sequential frame stream
pub trait FrameSource: Send {
    /// Next frame, or None at end of stream. May block on I/O.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Source-reported frames per second. Validated by the pipeline at
    /// start; a source reporting 0 aborts the run before it begins.
    fn frame_rate(&self) -> f64;
}

/// Opens sources by identifier (path, URL, device name)
pub trait SourceProvider: Send {
    fn open(&self, identifier: &str) -> Result<Box<dyn FrameSource>>;
}

/// Deterministic in-process source: emits a fixed number of frames with
/// a moving gradient, stamped like a real decoder would stamp them.
/// Used by the demo binary and the test suite.
pub struct SyntheticSource {
    width: usize,
    height: usize,
    fps: f64,
    total_frames: u64,
    current_frame: u64,
}

impl SyntheticSource {
    pub fn new(width: usize, height: usize, fps: f64, total_frames: u64) -> Self {
        Self {
            width,
            height,
            fps,
            total_frames,
            current_frame: 0,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.current_frame >= self.total_frames {
            return Ok(None);
        }
        self.current_frame += 1;
        let timestamp_ms = (self.current_frame as f64 / self.fps) * 1000.0;

        let mut frame = Frame::new(self.width, self.height, timestamp_ms);
        let shift = (self.current_frame % 256) as u8;
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = (y * self.width + x) * 3;
                frame.data[idx] = (x as u8).wrapping_add(shift);
                frame.data[idx + 1] = (y as u8).wrapping_add(shift);
                frame.data[idx + 2] = shift;
            }
        }
        Ok(Some(frame))
    }

    fn frame_rate(&self) -> f64 {
        self.fps
    }
}

/// Provider for synthetic streams. Accepts identifiers of the form
/// `synthetic:<frames>` and rejects anything else, so open-failure paths
/// stay exercisable without a real decoder.
pub struct SyntheticProvider {
    pub width: usize,
    pub height: usize,
    pub fps: f64,
}

impl SyntheticProvider {
    pub fn new(width: usize, height: usize, fps: f64) -> Self {
        Self { width, height, fps }
    }
}

impl SourceProvider for SyntheticProvider {
    fn open(&self, identifier: &str) -> Result<Box<dyn FrameSource>> {
        let frames = identifier
            .strip_prefix("synthetic:")
            .and_then(|n| n.parse::<u64>().ok())
            .ok_or_else(|| {
                PipelineError::source_open(identifier, "expected 'synthetic:<frame count>'")
            })?;

        Ok(Box::new(SyntheticSource::new(
            self.width,
            self.height,
            self.fps,
            frames,
        )))
    }
}
