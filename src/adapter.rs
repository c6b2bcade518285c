// src/adapter.rs
//
// Detector adapter boundary. Each adapter wraps one opaque model that
// maps a frame to boxes + scores + labels, optionally with stable track
// ids from an internal tracker. Adapters are supplied pre-constructed;
// model loading happens outside this crate.

use crate::error::Result;
use crate::types::{Detection, Frame};

pub trait DetectorAdapter: Send {
    fn name(&self) -> &str;

    /// Run the model on one frame. `&mut self` because adapters may keep
    /// internal identity-assignment state across calls; that state is
    /// opaque to the fusion engine.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Adapter that replays a canned per-frame detection script. Stands in
/// for a real model in the demo binary and in tests, the same way the
/// upstream system mocks its models.
pub struct ScriptedAdapter {
    name: String,
    script: Vec<Vec<Detection>>,
    cursor: usize,
}

impl ScriptedAdapter {
    pub fn new(name: &str, script: Vec<Vec<Detection>>) -> Self {
        Self {
            name: name.to_string(),
            script,
            cursor: 0,
        }
    }

    /// A single detection drifting right by `step_px` per frame, useful
    /// for demonstrating fusion and speed readouts.
    pub fn drifting_box(
        name: &str,
        label: &str,
        track_id: Option<i64>,
        origin: [i32; 4],
        step_px: i32,
        frames: usize,
    ) -> Self {
        let script = (0..frames)
            .map(|i| {
                let dx = step_px * i as i32;
                vec![Detection {
                    bbox: [origin[0] + dx, origin[1], origin[2] + dx, origin[3]],
                    score: 0.9,
                    label: label.to_string(),
                    track_id,
                    source_index: 0,
                }]
            })
            .collect();
        Self::new(name, script)
    }
}

impl DetectorAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        let detections = self
            .script
            .get(self.cursor)
            .cloned()
            .unwrap_or_default();
        self.cursor += 1;
        Ok(detections)
    }
}
