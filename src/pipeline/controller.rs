// src/pipeline/controller.rs
//
// Streaming pipeline controller. Owns the per-frame producer loop:
// read frame -> fan out to adapters -> fuse -> track -> annotate ->
// hand off to the sink. One producer thread per run; fusion, tracking
// and annotation run synchronously inside it, so none of them need
// locks of their own.
//
// States: Idle -> Running -> Stopping -> Idle, with a terminal Failed
// reachable from Running. Stop is cooperative: the thread checks the
// stop flag at the top of every iteration and again after the blocking
// read, never mid-adapter.

use crate::adapter::DetectorAdapter;
use crate::annotator::{resize_frame, FrameAnnotator};
use crate::error::{PipelineError, Result};
use crate::fusion::DetectionMerger;
use crate::pipeline::{EventBus, PipelineEvent, PipelineMetrics};
use crate::segmentation::{SegmentationAdapter, SegmentationOverlay};
use crate::sink::{frame_channel, FrameReceiver, FrameSink, PushOutcome};
use crate::source::{FrameSource, SourceProvider};
use crate::tracker::MotionTracker;
use crate::types::{Config, Detection, FrameSize, RenderedFrame, TrackedDetection};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const EVENT_BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Stopping,
    Failed,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Stopping,
            3 => Self::Failed,
            _ => Self::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Stopping => 2,
            Self::Failed => 3,
        }
    }
}

#[derive(Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new(state: PipelineState) -> Self {
        Self(Arc::new(AtomicU8::new(state.as_u8())))
    }

    fn get(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: PipelineState) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }
}

type SharedAdapter = Arc<Mutex<Box<dyn DetectorAdapter>>>;
type SharedSegmenter = Arc<Mutex<Box<dyn SegmentationAdapter>>>;

pub struct PipelineController {
    config: Config,
    provider: Box<dyn SourceProvider>,
    adapters: Vec<SharedAdapter>,
    segmentation: Option<(SharedSegmenter, Arc<SegmentationOverlay>)>,
    sink: FrameSink,
    metrics: PipelineMetrics,
    events: Arc<Mutex<EventBus>>,
    state: SharedState,
    stop_flag: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<String>>>,
    worker: Option<JoinHandle<()>>,
}

impl PipelineController {
    /// Build a controller around a validated config. Returns the
    /// consumer side of the frame channel for the display surface.
    pub fn new(
        config: Config,
        provider: Box<dyn SourceProvider>,
    ) -> Result<(Self, FrameReceiver)> {
        config.validate()?;
        let (sink, receiver) = frame_channel(config.sink.capacity);

        let controller = Self {
            config,
            provider,
            adapters: Vec::new(),
            segmentation: None,
            sink,
            metrics: PipelineMetrics::new(),
            events: Arc::new(Mutex::new(EventBus::new(EVENT_BUS_CAPACITY))),
            state: SharedState::new(PipelineState::Idle),
            stop_flag: Arc::new(AtomicBool::new(false)),
            last_error: Arc::new(Mutex::new(None)),
            worker: None,
        };
        Ok((controller, receiver))
    }

    /// Register a pre-constructed detector. Adapters are invoked in
    /// registration order, which fixes the fusion input order.
    pub fn add_adapter(&mut self, adapter: Box<dyn DetectorAdapter>) {
        self.adapters.push(Arc::new(Mutex::new(adapter)));
    }

    /// Attach an optional segmentation stage; its colored mask is
    /// blended under the detection boxes.
    pub fn set_segmentation(
        &mut self,
        adapter: Box<dyn SegmentationAdapter>,
        overlay: SegmentationOverlay,
    ) {
        self.segmentation = Some((Arc::new(Mutex::new(adapter)), Arc::new(overlay)));
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn drain_events(&self) -> Vec<PipelineEvent> {
        match self.events.lock() {
            Ok(mut bus) => bus.drain(),
            Err(_) => Vec::new(),
        }
    }

    /// Summary error of the last failed run, if any
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }

    /// Open the source and launch the producer thread. Failure to open
    /// leaves the controller in Idle and is not retried.
    pub fn start(&mut self, identifier: &str) -> Result<()> {
        match self.state.get() {
            PipelineState::Running | PipelineState::Stopping => {
                warn!("Pipeline already running, ignoring start request");
                return Ok(());
            }
            _ => {}
        }

        // Reap the previous run; an explicit restart clears Failed
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.state.set(PipelineState::Idle);
        if let Ok(mut err) = self.last_error.lock() {
            *err = None;
        }
        // Metrics describe one run at a time
        self.metrics.reset();

        let source = self.provider.open(identifier)?;
        let fps = source.frame_rate();
        let tracker = MotionTracker::new(fps)?;
        let merger = DetectionMerger::new(
            self.config.fusion.iou_threshold,
            self.config.fusion.merge_policy,
            self.config.fusion.label_scoped,
        );

        info!(
            "Starting pipeline on '{}' @ {:.1} fps with {} adapter(s)",
            identifier,
            fps,
            self.adapters.len()
        );

        self.stop_flag.store(false, Ordering::SeqCst);
        self.state.set(PipelineState::Running);
        self.publish(PipelineEvent::RunStarted {
            identifier: identifier.to_string(),
            fps,
        });

        let ctx = RunContext {
            source,
            adapters: self.adapters.clone(),
            segmentation: self.segmentation.clone(),
            merger,
            tracker,
            annotator: FrameAnnotator::new(),
            tracking_enabled: self.config.tracking.enabled,
            processing_size: self.config.video.processing_size,
            display_size: self.config.video.display_size,
            sink: self.sink.clone(),
            metrics: self.metrics.clone(),
            events: Arc::clone(&self.events),
            stop_flag: Arc::clone(&self.stop_flag),
            state: self.state.clone(),
            last_error: Arc::clone(&self.last_error),
        };

        let worker = thread::Builder::new()
            .name("robosight-pipeline".to_string())
            .spawn(move || ctx.run())
            .map_err(|e| {
                self.state.set(PipelineState::Idle);
                PipelineError::stage("spawn", e.to_string())
            })?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Request a cooperative stop and wait for the producer to finish
    /// handing off its in-flight frame. The wait is bounded: the thread
    /// observes the flag within one frame's processing time.
    pub fn stop(&mut self) {
        if self.state.get() == PipelineState::Running {
            self.state.set(PipelineState::Stopping);
        }
        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Pipeline thread panicked during shutdown");
                self.state.set(PipelineState::Failed);
                if let Ok(mut err) = self.last_error.lock() {
                    *err = Some("pipeline thread panicked".to_string());
                }
            }
        }
    }

    fn publish(&self, event: PipelineEvent) {
        if let Ok(mut bus) = self.events.lock() {
            bus.publish(event);
        }
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything one run needs, moved onto the producer thread. The source
/// is released (dropped) when the run ends, whatever the outcome.
struct RunContext {
    source: Box<dyn FrameSource>,
    adapters: Vec<SharedAdapter>,
    segmentation: Option<(SharedSegmenter, Arc<SegmentationOverlay>)>,
    merger: DetectionMerger,
    tracker: MotionTracker,
    annotator: FrameAnnotator,
    tracking_enabled: bool,
    processing_size: Option<FrameSize>,
    display_size: Option<FrameSize>,
    sink: FrameSink,
    metrics: PipelineMetrics,
    events: Arc<Mutex<EventBus>>,
    stop_flag: Arc<AtomicBool>,
    state: SharedState,
    last_error: Arc<Mutex<Option<String>>>,
}

impl RunContext {
    fn run(mut self) {
        let interval = Duration::from_secs_f64(self.tracker.frame_interval_secs());
        let mut frame_id: u64 = 0;

        loop {
            if self.stop_flag.load(Ordering::SeqCst) {
                break;
            }
            let loop_start = Instant::now();

            let frame = match self.source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Source exhausted after {} frames", frame_id);
                    break;
                }
                Err(e) => {
                    self.fail(format!("source read failed: {}", e));
                    return;
                }
            };
            // The read may have blocked for a while; honor a stop that
            // arrived in the meantime before doing any work
            if self.stop_flag.load(Ordering::SeqCst) {
                break;
            }
            frame_id += 1;

            let frame = match self.processing_size {
                Some(size) => resize_frame(&frame, size),
                None => frame,
            };

            // Fan out to every adapter. A failing adapter contributes
            // zero detections; the frame carries on with the rest.
            let inference_start = Instant::now();
            let mut raw: Vec<Detection> = Vec::new();
            for (idx, adapter) in self.adapters.iter().enumerate() {
                let mut guard = match adapter.lock() {
                    Ok(guard) => guard,
                    Err(_) => {
                        self.fail(format!("adapter {} lock poisoned", idx));
                        return;
                    }
                };
                match guard.infer(&frame) {
                    Ok(mut detections) => {
                        for det in &mut detections {
                            det.source_index = idx;
                        }
                        raw.extend(detections);
                    }
                    Err(e) => {
                        warn!(
                            "Adapter '{}' failed on frame {}: {}",
                            guard.name(),
                            frame_id,
                            e
                        );
                        self.metrics.inc(&self.metrics.adapter_failures);
                        self.publish(PipelineEvent::AdapterFailed {
                            adapter: guard.name().to_string(),
                            frame_id,
                            reason: e.to_string(),
                        });
                    }
                }
            }
            self.metrics.set_timing(
                &self.metrics.inference_time_us,
                inference_start.elapsed().as_micros() as u64,
            );
            self.metrics.add(&self.metrics.raw_detections, raw.len() as u64);

            let fusion_start = Instant::now();
            let fused = self.merger.merge(&raw);
            self.metrics.set_timing(
                &self.metrics.fusion_time_us,
                fusion_start.elapsed().as_micros() as u64,
            );
            self.metrics
                .add(&self.metrics.fused_detections, fused.len() as u64);

            let tracked: Vec<TrackedDetection> = if self.tracking_enabled {
                self.tracker.update(fused)
            } else {
                fused
                    .into_iter()
                    .map(|f| TrackedDetection {
                        fused: f,
                        speed: None,
                    })
                    .collect()
            };

            // Optional terrain overlay, blended under the boxes. A
            // failed segmentation leaves the frame un-overlaid.
            let frame = match &self.segmentation {
                Some((adapter, overlay)) => {
                    let mut guard = match adapter.lock() {
                        Ok(guard) => guard,
                        Err(_) => {
                            self.fail("segmentation lock poisoned".to_string());
                            return;
                        }
                    };
                    match guard.segment(&frame) {
                        Ok(map) => overlay.overlay(&frame, &map),
                        Err(e) => {
                            warn!("Segmentation failed on frame {}: {}", frame_id, e);
                            self.metrics.inc(&self.metrics.adapter_failures);
                            frame
                        }
                    }
                }
                None => frame,
            };

            let annotate_start = Instant::now();
            let annotated = self.annotator.annotate(&frame, &tracked);
            self.metrics.set_timing(
                &self.metrics.annotate_time_us,
                annotate_start.elapsed().as_micros() as u64,
            );

            let out = match self.display_size {
                Some(size) => resize_frame(&annotated, size),
                None => annotated,
            };

            match self.sink.try_push(RenderedFrame {
                frame_id,
                frame: out,
                detection_count: tracked.len(),
            }) {
                PushOutcome::Accepted => {}
                PushOutcome::Dropped => {
                    debug!("Sink full, dropping frame {}", frame_id);
                    self.metrics.inc(&self.metrics.frames_dropped);
                    self.publish(PipelineEvent::FrameDropped { frame_id });
                }
            }
            self.metrics.inc(&self.metrics.total_frames);

            // Never outrun the source's playback rate
            if let Some(remaining) = interval.checked_sub(loop_start.elapsed()) {
                thread::sleep(remaining);
            }
        }

        // Cooperative stop or end of stream: finish the hand-off, then
        // release the source and clear per-run state
        self.state.set(PipelineState::Stopping);
        self.tracker.reset();
        self.publish(PipelineEvent::RunCompleted {
            frames_processed: frame_id,
        });
        self.state.set(PipelineState::Idle);
        info!("Pipeline run complete: {} frames", frame_id);
    }

    fn fail(&self, reason: String) {
        error!("Pipeline run failed: {}", reason);
        if let Ok(mut err) = self.last_error.lock() {
            *err = Some(reason.clone());
        }
        self.publish(PipelineEvent::RunFailed { reason });
        self.state.set(PipelineState::Failed);
    }

    fn publish(&self, event: PipelineEvent) {
        if let Ok(mut bus) = self.events.lock() {
            bus.publish(event);
        }
    }
}
