// src/pipeline/event_bus.rs
//
// Decoupled event system. The pipeline thread publishes run-level
// events instead of reaching into GUI state; the embedding display
// drains them at its own pace.

use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStarted {
        identifier: String,
        fps: f64,
    },

    /// One detector failed on one frame. Not surfaced to the user
    /// directly; kept for diagnostics.
    AdapterFailed {
        adapter: String,
        frame_id: u64,
        reason: String,
    },

    /// The sink was full; this frame was never handed off
    FrameDropped {
        frame_id: u64,
    },

    /// The run hit a fatal error and moved to Failed. Exactly one of
    /// these summarizes a failed run.
    RunFailed {
        reason: String,
    },

    RunCompleted {
        frames_processed: u64,
    },
}

pub struct EventBus {
    events: VecDeque<PipelineEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: PipelineEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}
