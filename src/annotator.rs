// src/annotator.rs
//
// Frame annotation. Draws fused detections onto a private copy of the
// frame: a bounding rectangle in a color stable per identity, plus a
// text readout. Tracked objects get "ID n | CONF | speed" at the box
// corner; untracked objects get "label | conf | size" at the centroid,
// matching the two detector families upstream.

use crate::types::{Frame, FrameSize, TrackedDetection};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const BOX_THICKNESS: i32 = 2;
const TEXT_COLOR_TRACKED: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_COLOR_STATIC: Rgb<u8> = Rgb([255, 255, 0]);

pub struct FrameAnnotator;

impl FrameAnnotator {
    pub fn new() -> Self {
        Self
    }

    /// Render detections onto a fresh copy of the frame. Deterministic
    /// given the same frame and detections; the input is never mutated.
    pub fn annotate(&self, frame: &Frame, detections: &[TrackedDetection]) -> Frame {
        let mut img = frame_to_image(frame);

        for det in detections {
            let fused = &det.fused;
            let color = identity_color(fused.track_id, &fused.label);
            let [x1, y1, x2, y2] = fused.bbox;

            draw_box(&mut img, x1, y1, x2, y2, color);

            let (text, tx, ty, text_color) = match fused.track_id {
                Some(id) => {
                    let mut text = format!("Id {} | Conf: {:.2}", id, fused.score);
                    if let Some(speed) = det.speed {
                        text.push_str(&format!(" | {:.1} px/s", speed));
                    }
                    (text, x1, y1 - 10, TEXT_COLOR_TRACKED)
                }
                None => {
                    let text = format!(
                        "{} | {:.2} | Size: {} px",
                        fused.label,
                        fused.score,
                        fused.area_px()
                    );
                    let (cx, cy) = fused.centroid();
                    (text, cx as i32, cy as i32, TEXT_COLOR_STATIC)
                }
            };

            draw_text(&mut img, &text, tx.max(0), ty.max(0), text_color);
        }

        image_to_frame(img, frame.timestamp_ms)
    }
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable color per identity: seeded PRNG keyed by the track id, or by a
/// hash of the label when no id exists. The same object keeps the same
/// color across frames and across runs.
pub fn identity_color(track_id: Option<i64>, label: &str) -> Rgb<u8> {
    let seed = match track_id {
        Some(id) => id as u64,
        None => {
            let mut hasher = DefaultHasher::new();
            label.hash(&mut hasher);
            hasher.finish()
        }
    };
    let mut rng = StdRng::seed_from_u64(seed);
    Rgb([rng.gen(), rng.gen(), rng.gen()])
}

/// Resize a frame with bilinear filtering
pub fn resize_frame(frame: &Frame, size: FrameSize) -> Frame {
    if frame.width == size.width as usize && frame.height == size.height as usize {
        return frame.clone();
    }
    let img = frame_to_image(frame);
    let resized = image::imageops::resize(
        &img,
        size.width,
        size.height,
        image::imageops::FilterType::Triangle,
    );
    image_to_frame(resized, frame.timestamp_ms)
}

pub fn frame_to_image(frame: &Frame) -> RgbImage {
    RgbImage::from_raw(frame.width as u32, frame.height as u32, frame.data.clone())
        .unwrap_or_else(|| RgbImage::new(frame.width as u32, frame.height as u32))
}

pub fn image_to_frame(img: RgbImage, timestamp_ms: f64) -> Frame {
    let width = img.width() as usize;
    let height = img.height() as usize;
    Frame {
        data: img.into_raw(),
        width,
        height,
        timestamp_ms,
    }
}

fn draw_box(img: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb<u8>) {
    // Pixel-inclusive corners: a box (10,10)-(40,40) is 31 px wide
    let w = (x2 - x1 + 1).max(1) as u32;
    let h = (y2 - y1 + 1).max(1) as u32;
    for offset in 0..BOX_THICKNESS {
        let rect = Rect::at(x1 - offset, y1 - offset)
            .of_size(w + (offset * 2) as u32, h + (offset * 2) as u32);
        draw_hollow_rect_mut(img, rect, color);
    }
}

/// Draw text with the built-in 5x7 bitmap font. Good enough for box
/// labels without dragging a font rasterizer into the pipeline.
fn draw_text(img: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
    const CHAR_W: i32 = 6;

    for (i, ch) in text.to_uppercase().chars().enumerate() {
        let char_x = x + i as i32 * CHAR_W;
        let pattern = glyph(ch);

        for (row, &bits) in pattern.iter().enumerate() {
            for col in 0..5 {
                if (bits >> (4 - col)) & 1 == 1 {
                    let px = char_x + col;
                    let py = y + row as i32;
                    if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height()
                    {
                        img.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
    }
}

/// 5x7 bitmap pattern per character, one u8 row per scanline
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b11011, 0b10001],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '%' => [0b11001, 0b11010, 0b00010, 0b00100, 0b01000, 0b01011, 0b10011],
        ' ' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '|' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        '/' => [0b00001, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b10000],
        // Box for unknown chars
        _ => [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111],
    }
}
