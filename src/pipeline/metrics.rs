// src/pipeline/metrics.rs
//
// Production observability. Tracks counts, rates, and stage timings for
// the frame loop; cheap enough to update on every frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub frames_dropped: Arc<AtomicU64>,
    pub adapter_failures: Arc<AtomicU64>,
    pub raw_detections: Arc<AtomicU64>,
    pub fused_detections: Arc<AtomicU64>,
    pub inference_time_us: Arc<AtomicU64>,
    pub fusion_time_us: Arc<AtomicU64>,
    pub annotate_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            frames_dropped: Arc::new(AtomicU64::new(0)),
            adapter_failures: Arc::new(AtomicU64::new(0)),
            raw_detections: Arc::new(AtomicU64::new(0)),
            fused_detections: Arc::new(AtomicU64::new(0)),
            inference_time_us: Arc::new(AtomicU64::new(0)),
            fusion_time_us: Arc::new(AtomicU64::new(0)),
            annotate_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    /// Zero every counter and restart the clock. Called once per run so
    /// the summary describes the latest run, not the controller's lifetime.
    pub fn reset(&mut self) {
        for counter in [
            &self.total_frames,
            &self.frames_dropped,
            &self.adapter_failures,
            &self.raw_detections,
            &self.fused_detections,
            &self.inference_time_us,
            &self.fusion_time_us,
            &self.annotate_time_us,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.started_at = Instant::now();
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            adapter_failures: self.adapter_failures.load(Ordering::Relaxed),
            raw_detections: self.raw_detections.load(Ordering::Relaxed),
            fused_detections: self.fused_detections.load(Ordering::Relaxed),
            fps: self.fps(),
            last_inference_us: self.inference_time_us.load(Ordering::Relaxed),
            last_fusion_us: self.fusion_time_us.load(Ordering::Relaxed),
            last_annotate_us: self.annotate_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub frames_dropped: u64,
    pub adapter_failures: u64,
    pub raw_detections: u64,
    pub fused_detections: u64,
    pub fps: f64,
    pub last_inference_us: u64,
    pub last_fusion_us: u64,
    pub last_annotate_us: u64,
    pub elapsed_secs: f64,
}
