// src/segmentation.rs
//
// Terrain segmentation boundary and overlay. The model itself is an
// opaque collaborator that maps a frame to a per-pixel class map; this
// module owns turning that map into a colored overlay blended onto the
// frame (0.7 frame / 0.3 mask), with the map scaled to frame size by
// nearest neighbor.

use crate::error::Result;
use crate::types::Frame;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FRAME_WEIGHT: f32 = 0.7;
const MASK_WEIGHT: f32 = 0.3;

/// Per-pixel class assignments, usually at model resolution rather than
/// frame resolution
#[derive(Debug, Clone)]
pub struct ClassMap {
    pub classes: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

pub trait SegmentationAdapter: Send {
    fn name(&self) -> &str;

    fn segment(&mut self, frame: &Frame) -> Result<ClassMap>;
}

pub struct SegmentationOverlay {
    palette: Vec<[u8; 3]>,
}

impl SegmentationOverlay {
    /// Palette with one pseudo-random color per class, stable for a
    /// given seed so overlays do not flicker between frames.
    pub fn new(num_classes: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let palette = (0..num_classes)
            .map(|_| [rng.gen(), rng.gen(), rng.gen()])
            .collect();
        Self { palette }
    }

    /// Blend the colored class map over a copy of the frame. A map that
    /// is empty or smaller than its declared dimensions is ignored; the
    /// frame passes through un-overlaid.
    pub fn overlay(&self, frame: &Frame, map: &ClassMap) -> Frame {
        let mut out = frame.clone();
        if map.width == 0
            || map.height == 0
            || self.palette.is_empty()
            || map.classes.len() < map.width * map.height
        {
            return out;
        }

        for y in 0..frame.height {
            // Nearest-neighbor lookup into the class map
            let my = y * map.height / frame.height;
            for x in 0..frame.width {
                let mx = x * map.width / frame.width;
                let class = map.classes[my * map.width + mx] as usize;
                let color = self.palette[class % self.palette.len()];

                let idx = (y * frame.width + x) * 3;
                for c in 0..3 {
                    let blended = frame.data[idx + c] as f32 * FRAME_WEIGHT
                        + color[c] as f32 * MASK_WEIGHT;
                    out.data[idx + c] = blended.round().min(255.0) as u8;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_map(class: u8, width: usize, height: usize) -> ClassMap {
        ClassMap {
            classes: vec![class; width * height],
            width,
            height,
        }
    }

    #[test]
    fn test_overlay_blends_with_expected_weights() {
        let mut frame = Frame::new(4, 4, 0.0);
        frame.data.fill(100);

        let overlay = SegmentationOverlay::new(3, 42);
        let out = overlay.overlay(&frame, &uniform_map(1, 4, 4));

        let color = {
            let mut rng = StdRng::seed_from_u64(42);
            let palette: Vec<[u8; 3]> = (0..3).map(|_| [rng.gen(), rng.gen(), rng.gen()]).collect();
            palette[1]
        };
        let expected = (100.0 * 0.7 + color[0] as f32 * 0.3).round() as u8;
        assert_eq!(out.data[0], expected);
        // Input untouched
        assert_eq!(frame.data[0], 100);
    }

    #[test]
    fn test_overlay_scales_map_to_frame() {
        // 2x2 map over an 8x8 frame: quadrants take distinct classes
        let mut frame = Frame::new(8, 8, 0.0);
        frame.data.fill(0);
        let map = ClassMap {
            classes: vec![0, 1, 2, 3],
            width: 2,
            height: 2,
        };
        let overlay = SegmentationOverlay::new(4, 7);
        let out = overlay.overlay(&frame, &map);

        let px = |x: usize, y: usize| {
            let idx = (y * 8 + x) * 3;
            [out.data[idx], out.data[idx + 1], out.data[idx + 2]]
        };
        // Same quadrant, same color; different quadrants differ
        assert_eq!(px(0, 0), px(3, 3));
        assert_ne!(px(0, 0), px(7, 0));
        assert_ne!(px(0, 0), px(0, 7));
    }

    #[test]
    fn test_undersized_map_leaves_frame_unchanged() {
        // An adapter declaring 8x8 but delivering only 10 classes must
        // not take the producer thread down with it
        let frame = Frame::new(16, 16, 0.0);
        let overlay = SegmentationOverlay::new(4, 3);
        let out = overlay.overlay(
            &frame,
            &ClassMap {
                classes: vec![0; 10],
                width: 8,
                height: 8,
            },
        );
        assert_eq!(out.data, frame.data);
    }

    #[test]
    fn test_empty_map_is_a_no_op() {
        let frame = Frame::new(4, 4, 0.0);
        let overlay = SegmentationOverlay::new(4, 1);
        let out = overlay.overlay(
            &frame,
            &ClassMap {
                classes: vec![],
                width: 0,
                height: 0,
            },
        );
        assert_eq!(out.data, frame.data);
    }
}
