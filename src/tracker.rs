// src/tracker.rs
//
// Identity & motion tracking. Associates fused detections across frames
// by the track id assigned upstream and derives per-object speed from
// consecutive centroid positions.
//
// Track history is never evicted during a run: entries for ids that
// disappear stay resident until reset(). Unbounded for very long
// streams; bounded in practice by run length since every start builds a
// fresh tracker.

use crate::error::{PipelineError, Result};
use crate::types::{FusedDetection, TrackedDetection};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct TrackState {
    last_centroid: (f32, f32),
    last_timestamp: f64,
}

pub struct MotionTracker {
    tracks: HashMap<i64, TrackState>,
    frame_interval_secs: f64,
    /// Monotonic stream clock, advanced one frame interval per update
    clock_secs: f64,
}

impl MotionTracker {
    /// `fps` is the source's reported frame rate. A zero or invalid rate
    /// is a configuration error, surfaced before the run starts.
    pub fn new(fps: f64) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(PipelineError::configuration(format!(
                "source reported invalid frame rate {}",
                fps
            )));
        }
        Ok(Self {
            tracks: HashMap::new(),
            frame_interval_secs: 1.0 / fps,
            clock_secs: 0.0,
        })
    }

    pub fn frame_interval_secs(&self) -> f64 {
        self.frame_interval_secs
    }

    /// Attach speed (px/s) to every fused detection that carries a track
    /// id. Detections without an id pass through with no motion info.
    /// State updates are last-write-wins: no smoothing or filtering.
    pub fn update(&mut self, fused: Vec<FusedDetection>) -> Vec<TrackedDetection> {
        self.clock_secs += self.frame_interval_secs;
        let now = self.clock_secs;

        fused
            .into_iter()
            .map(|det| {
                let speed = det.track_id.map(|id| {
                    let centroid = det.centroid();
                    let speed = match self.tracks.get(&id) {
                        Some(prev) => {
                            let dx = (centroid.0 - prev.last_centroid.0) as f64;
                            let dy = (centroid.1 - prev.last_centroid.1) as f64;
                            let elapsed = now - prev.last_timestamp;
                            if elapsed > 1e-9 {
                                (dx * dx + dy * dy).sqrt() / elapsed
                            } else {
                                0.0
                            }
                        }
                        // First sighting of this id
                        None => 0.0,
                    };
                    self.tracks.insert(
                        id,
                        TrackState {
                            last_centroid: centroid,
                            last_timestamp: now,
                        },
                    );
                    speed
                });

                TrackedDetection { fused: det, speed }
            })
            .collect()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Clear all per-track state, e.g. between runs
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.clock_secs = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fused(bbox: [i32; 4], track_id: Option<i64>) -> FusedDetection {
        FusedDetection {
            bbox,
            score: 0.9,
            label: "fox".to_string(),
            track_id,
            source_index: 0,
            merge_count: 1,
        }
    }

    #[test]
    fn test_rejects_invalid_frame_rate() {
        assert!(MotionTracker::new(0.0).is_err());
        assert!(MotionTracker::new(-25.0).is_err());
        assert!(MotionTracker::new(f64::NAN).is_err());
        assert!(MotionTracker::new(f64::INFINITY).is_err());
        assert!(MotionTracker::new(30.0).is_ok());
    }

    #[test]
    fn test_first_sighting_has_zero_speed() {
        let mut tracker = MotionTracker::new(1.0).unwrap();
        let out = tracker.update(vec![fused([0, 0, 10, 10], Some(7))]);
        assert_eq!(out[0].speed, Some(0.0));
        assert_eq!(tracker.track_count(), 1);
    }

    #[test]
    fn test_speed_from_consecutive_centroids() {
        // Centroid moves (0,0) -> (30,40) over one second: a 3-4-5
        // triangle scaled, so speed is exactly 50 px/s
        let mut tracker = MotionTracker::new(1.0).unwrap();
        tracker.update(vec![fused([-5, -5, 5, 5], Some(1))]);
        let out = tracker.update(vec![fused([25, 35, 35, 45], Some(1))]);
        let speed = out[0].speed.unwrap();
        assert!((speed - 50.0).abs() < 1e-9, "speed was {}", speed);
    }

    #[test]
    fn test_untracked_detection_passes_through() {
        let mut tracker = MotionTracker::new(30.0).unwrap();
        let out = tracker.update(vec![fused([0, 0, 10, 10], None)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].speed, None);
        assert_eq!(tracker.track_count(), 0);
    }

    #[test]
    fn test_speed_spans_missed_frames() {
        // Track disappears for one frame; displacement is divided by the
        // full elapsed time, not a single interval
        let mut tracker = MotionTracker::new(1.0).unwrap();
        tracker.update(vec![fused([-5, -5, 5, 5], Some(3))]);
        tracker.update(vec![]); // frame with no sighting
        let out = tracker.update(vec![fused([15, -5, 25, 5], Some(3))]);
        // 20 px over 2 s
        assert!((out[0].speed.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_stale_tracks_are_retained_until_reset() {
        let mut tracker = MotionTracker::new(30.0).unwrap();
        tracker.update(vec![fused([0, 0, 10, 10], Some(1)), fused([20, 20, 30, 30], Some(2))]);
        tracker.update(vec![]);
        assert_eq!(tracker.track_count(), 2);

        tracker.reset();
        assert_eq!(tracker.track_count(), 0);
    }

    #[test]
    fn test_last_write_wins_on_duplicate_ids() {
        // Two fused detections with the same id in one frame: the later
        // one overwrites the stored centroid
        let mut tracker = MotionTracker::new(1.0).unwrap();
        tracker.update(vec![
            fused([-5, -5, 5, 5], Some(9)),
            fused([95, -5, 105, 5], Some(9)),
        ]);
        let out = tracker.update(vec![fused([95, -5, 105, 5], Some(9))]);
        // Distance from the last stored centroid (100,0) is zero
        assert!((out[0].speed.unwrap() - 0.0).abs() < 1e-9);
    }
}
