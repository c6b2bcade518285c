// src/fusion.rs
//
// Detection fusion: collapse overlapping box reports from several
// detectors into one de-duplicated set per frame.
//
// The clustering is greedy and incremental: each incoming detection is
// scanned against the merged list in insertion order and absorbed by the
// first entry whose IoU exceeds τ (first-match wins; later entries are
// not reconsidered). The result therefore depends on input order. With
// tens of detections per frame the pipeline is latency-bound by model
// inference, not by this O(n*m) pass.

use crate::error::PipelineError;
use crate::types::{Detection, FusedDetection, MergePolicy};
use tracing::warn;

pub struct DetectionMerger {
    iou_threshold: f32,
    policy: MergePolicy,
    label_scoped: bool,
}

impl DetectionMerger {
    pub fn new(iou_threshold: f32, policy: MergePolicy, label_scoped: bool) -> Self {
        Self {
            iou_threshold,
            policy,
            label_scoped,
        }
    }

    /// Merge raw detections into a de-duplicated list. Pure function of
    /// its input: no state is carried between frames.
    ///
    /// Detections with an inverted or empty box are dropped with a
    /// warning before clustering.
    pub fn merge(&self, detections: &[Detection]) -> Vec<FusedDetection> {
        let mut merged: Vec<FusedDetection> = Vec::new();

        for det in detections {
            if let Err(e) = validate_box(det) {
                warn!("Dropping malformed detection: {}", e);
                continue;
            }

            let mut absorbed = false;
            for entry in merged.iter_mut() {
                if self.label_scoped && entry.label != det.label {
                    continue;
                }

                if iou(&det.bbox, &entry.bbox) > self.iou_threshold {
                    match self.policy {
                        MergePolicy::UnionBox => {
                            entry.bbox = union_box(&entry.bbox, &det.bbox);
                            entry.score = entry.score.max(det.score);
                        }
                        MergePolicy::KeepBest => {
                            if det.score > entry.score {
                                entry.bbox = det.bbox;
                                entry.score = det.score;
                                entry.label = det.label.clone();
                                entry.track_id = det.track_id;
                                entry.source_index = det.source_index;
                            }
                        }
                    }
                    entry.merge_count += 1;
                    absorbed = true;
                    break;
                }
            }

            if !absorbed {
                merged.push(FusedDetection::from_detection(det.clone()));
            }
        }

        merged
    }
}

/// Intersection-over-Union on pixel-inclusive integer boxes
pub fn iou(a: &[i32; 4], b: &[i32; 4]) -> f32 {
    let inter_x1 = a[0].max(b[0]);
    let inter_y1 = a[1].max(b[1]);
    let inter_x2 = a[2].min(b[2]);
    let inter_y2 = a[3].min(b[3]);

    let inter_w = (inter_x2 - inter_x1 + 1).max(0) as i64;
    let inter_h = (inter_y2 - inter_y1 + 1).max(0) as i64;
    let inter_area = inter_w * inter_h;

    let area_a = (a[2] - a[0] + 1) as i64 * (a[3] - a[1] + 1) as i64;
    let area_b = (b[2] - b[0] + 1) as i64 * (b[3] - b[1] + 1) as i64;
    let union = area_a + area_b - inter_area;

    if union > 0 {
        inter_area as f32 / union as f32
    } else {
        0.0
    }
}

fn union_box(a: &[i32; 4], b: &[i32; 4]) -> [i32; 4] {
    [
        a[0].min(b[0]),
        a[1].min(b[1]),
        a[2].max(b[2]),
        a[3].max(b[3]),
    ]
}

fn validate_box(det: &Detection) -> Result<(), PipelineError> {
    let [x1, y1, x2, y2] = det.bbox;
    if x1 >= x2 || y1 >= y2 {
        return Err(PipelineError::FusionInvariant {
            bbox: det.bbox,
            source_index: det.source_index,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(bbox: [i32; 4], score: f32, label: &str, source: usize) -> Detection {
        Detection {
            bbox,
            score,
            label: label.to_string(),
            track_id: None,
            source_index: source,
        }
    }

    fn merger(tau: f32) -> DetectionMerger {
        DetectionMerger::new(tau, MergePolicy::UnionBox, false)
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(merger(0.5).merge(&[]).is_empty());
    }

    #[test]
    fn test_overlapping_boxes_merge_into_union() {
        // Two detectors reporting the same fox
        let dets = vec![
            det([10, 10, 50, 50], 0.9, "fox", 0),
            det([12, 12, 48, 48], 0.8, "fox", 1),
        ];
        let fused = merger(0.5).merge(&dets);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].bbox, [10, 10, 50, 50]);
        assert_eq!(fused[0].score, 0.9);
        assert_eq!(fused[0].merge_count, 2);
    }

    #[test]
    fn test_disjoint_boxes_stay_separate() {
        let dets = vec![
            det([0, 0, 10, 10], 0.9, "fox", 0),
            det([100, 100, 110, 110], 0.8, "fox", 1),
        ];
        let fused = merger(0.5).merge(&dets);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].bbox, [0, 0, 10, 10]);
        assert_eq!(fused[1].bbox, [100, 100, 110, 110]);
        assert_eq!(fused[0].merge_count, 1);
    }

    #[test]
    fn test_boxes_at_threshold_do_not_merge() {
        // Identical boxes have IoU 1.0; shifted ones below τ must not merge
        let a = [0, 0, 9, 9];
        let b = [8, 0, 17, 9]; // IoU = 20/180 ≈ 0.11
        assert!(iou(&a, &b) <= 0.5);
        let fused = merger(0.5).merge(&[det(a, 0.9, "x", 0), det(b, 0.9, "x", 1)]);
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_self_merge_is_idempotent() {
        let dets = vec![
            det([10, 10, 50, 50], 0.9, "fox", 0),
            det([12, 12, 48, 48], 0.8, "fox", 1),
            det([200, 200, 240, 240], 0.7, "rabbit", 0),
        ];
        let m = merger(0.5);
        let fused = m.merge(&dets);

        // Re-fusing the fused output with itself must not reduce further
        let as_raw: Vec<Detection> = fused
            .iter()
            .map(|f| det(f.bbox, f.score, &f.label, f.source_index))
            .collect();
        let refused = m.merge(&as_raw);
        assert_eq!(refused.len(), fused.len());
        for (a, b) in refused.iter().zip(fused.iter()) {
            assert_eq!(a.bbox, b.bbox);
            assert_eq!(a.score, b.score);
        }
    }

    #[test]
    fn test_cluster_count_stable_under_permutation() {
        // Two tight clusters far apart: any input order must produce
        // exactly two survivors
        let a1 = det([0, 0, 20, 20], 0.9, "x", 0);
        let a2 = det([1, 1, 21, 21], 0.8, "x", 1);
        let b1 = det([500, 500, 520, 520], 0.7, "x", 0);
        let b2 = det([501, 501, 521, 521], 0.6, "x", 1);

        let orders = vec![
            vec![a1.clone(), a2.clone(), b1.clone(), b2.clone()],
            vec![b2.clone(), a1.clone(), b1.clone(), a2.clone()],
            vec![a2.clone(), b1.clone(), b2.clone(), a1.clone()],
        ];
        for order in orders {
            assert_eq!(merger(0.5).merge(&order).len(), 2);
        }
    }

    #[test]
    fn test_keep_best_policy_discards_weaker_box() {
        let dets = vec![
            det([10, 10, 50, 50], 0.7, "fox", 0),
            det([12, 12, 48, 48], 0.9, "people", 1),
        ];
        let m = DetectionMerger::new(0.5, MergePolicy::KeepBest, false);
        let fused = m.merge(&dets);
        assert_eq!(fused.len(), 1);
        // Higher-scoring detection wins box and label outright
        assert_eq!(fused[0].bbox, [12, 12, 48, 48]);
        assert_eq!(fused[0].score, 0.9);
        assert_eq!(fused[0].label, "people");
        assert_eq!(fused[0].merge_count, 2);
    }

    #[test]
    fn test_label_scoping_keeps_different_labels_apart() {
        let dets = vec![
            det([10, 10, 50, 50], 0.9, "fox", 0),
            det([12, 12, 48, 48], 0.8, "rabbit", 1),
        ];
        let m = DetectionMerger::new(0.5, MergePolicy::UnionBox, true);
        assert_eq!(m.merge(&dets).len(), 2);

        // Without scoping the same pair collapses
        assert_eq!(merger(0.5).merge(&dets).len(), 1);
    }

    #[test]
    fn test_degenerate_boxes_are_rejected() {
        let dets = vec![
            det([50, 50, 10, 10], 0.9, "fox", 0), // inverted
            det([10, 10, 10, 40], 0.9, "fox", 0), // zero width
            det([10, 10, 50, 50], 0.8, "fox", 1),
        ];
        let fused = merger(0.5).merge(&dets);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].bbox, [10, 10, 50, 50]);
    }

    #[test]
    fn test_extreme_scores_pass_through_when_disjoint() {
        let dets = vec![
            det([0, 0, 10, 10], 0.0, "a", 0),
            det([100, 100, 110, 110], 1.0, "b", 1),
        ];
        let fused = merger(0.5).merge(&dets);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].score, 0.0);
        assert_eq!(fused[1].score, 1.0);
    }

    #[test]
    fn test_iou_is_pixel_inclusive() {
        // Two 10x10 inclusive boxes sharing a 1-pixel-wide column
        let a = [0, 0, 9, 9];
        let b = [9, 0, 18, 9];
        let expected = 10.0 / (100.0 + 100.0 - 10.0);
        assert!((iou(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_first_match_wins_absorption() {
        // d3 overlaps both d1 and d2; it must be absorbed by d1 (first in
        // insertion order) and never re-checked against d2
        let d1 = det([0, 0, 40, 40], 0.5, "x", 0);
        let d2 = det([60, 0, 100, 40], 0.5, "x", 0);
        let d3 = det([5, 5, 45, 45], 0.9, "x", 1);
        let fused = merger(0.3).merge(&[d1, d2, d3]);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].bbox, [0, 0, 45, 45]);
        assert_eq!(fused[0].merge_count, 2);
        assert_eq!(fused[1].merge_count, 1);
    }
}
