// src/sink.rs
//
// Bounded hand-off between the pipeline thread and the display surface.
// Capacity is fixed at construction; a push against a full channel
// returns Dropped instead of blocking, so a slow consumer sheds stale
// frames instead of stalling inference.

use crate::types::RenderedFrame;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    /// The sink was full or the consumer went away; the frame was not queued
    Dropped,
}

/// Producer side of the frame channel
#[derive(Clone)]
pub struct FrameSink {
    tx: Sender<RenderedFrame>,
}

impl FrameSink {
    /// Non-blocking best-effort push. Never queues unboundedly.
    pub fn try_push(&self, frame: RenderedFrame) -> PushOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => PushOutcome::Accepted,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => PushOutcome::Dropped,
        }
    }
}

/// Consumer side, owned by the display surface
pub struct FrameReceiver {
    rx: Receiver<RenderedFrame>,
}

impl FrameReceiver {
    pub fn try_recv(&self) -> Option<RenderedFrame> {
        self.rx.try_recv().ok()
    }

    /// Blocking receive with a deadline. Returns None on timeout or once
    /// the producer hangs up.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RenderedFrame> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Create a bounded frame channel of the given depth
pub fn frame_channel(capacity: usize) -> (FrameSink, FrameReceiver) {
    let (tx, rx) = bounded(capacity);
    (FrameSink { tx }, FrameReceiver { rx })
}
