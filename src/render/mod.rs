//! Frame annotation: tracked-region boxes, status text, and the
//! heartbeat-synchronized forehead blend.

use ab_glyph::{FontArc, PxScale};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use log::{info, warn};

use crate::detection::FaceRect;

pub const FACE_BOX_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const FOREHEAD_BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

const GUIDE_SCALE: f32 = 18.0;
const STATUS_SCALE: f32 = 24.0;
const GUIDE_LEFT: i32 = 10;
const GUIDE_TOP: i32 = 20;
const GUIDE_LINE_STEP: i32 = 25;

/// Parse raw font bytes into a drawable handle.
pub fn load_font(data: Vec<u8>) -> Option<FontArc> {
    match FontArc::try_from_vec(data) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("failed to parse font data: {e}");
            None
        }
    }
}

/// Draws all session overlays. Works without a font, in which case text is
/// skipped; box drawing and the pulse blend are unaffected.
pub struct Overlay {
    font: Option<FontArc>,
}

impl Overlay {
    pub fn new(font: Option<FontArc>) -> Self {
        if font.is_none() {
            info!("no overlay font configured, text annotations disabled");
        }
        Self { font }
    }

    pub fn draw_box(&self, frame: &mut RgbImage, rect: &FaceRect, color: Rgb<u8>) {
        if rect.w <= 0 || rect.h <= 0 {
            return;
        }
        draw_hollow_rect_mut(
            frame,
            Rect::at(rect.x, rect.y).of_size(rect.w as u32, rect.h as u32),
            color,
        );
    }

    /// Guidance block in the top-left corner, one entry per line.
    pub fn guide_lines(&self, frame: &mut RgbImage, lines: &[&str]) {
        for (i, line) in lines.iter().enumerate() {
            self.label(
                frame,
                line,
                GUIDE_LEFT,
                GUIDE_TOP + GUIDE_LINE_STEP * i as i32,
                GUIDE_SCALE,
            );
        }
    }

    /// Larger status text, e.g. the BPM readout next to the forehead box.
    pub fn status_label(&self, frame: &mut RgbImage, text: &str, x: i32, y: i32) {
        self.label(frame, text, x, y, STATUS_SCALE);
    }

    /// Light text over a dark outline so it stays readable on skin tones.
    fn label(&self, frame: &mut RgbImage, text: &str, x: i32, y: i32, size: f32) {
        let Some(font) = &self.font else {
            return;
        };
        let x = x.max(0);
        let y = y.max(0);
        let scale = PxScale::from(size);
        for (dx, dy) in [(-1, -1), (1, -1), (-1, 1), (1, 1)] {
            draw_text_mut(frame, OUTLINE_COLOR, x + dx, y + dy, scale, font, text);
        }
        draw_text_mut(frame, TEXT_COLOR, x, y, scale, font, text);
    }

    /// Composite the heartbeat pulse onto `rect`: each channel is scaled by
    /// `t`, and the green channel additionally picks up `(1 - t)` of the
    /// equalized grayscale frame. Purely visual.
    pub fn pulse_blend(&self, frame: &mut RgbImage, gray: &GrayImage, rect: &FaceRect, t: f64) {
        let (w, h) = frame.dimensions();
        let alpha = t;
        let beta = 1.0 - t;
        let x1 = (rect.x + rect.w).clamp(0, w as i32) as u32;
        let y1 = (rect.y + rect.h).clamp(0, h as i32) as u32;
        for y in rect.y.max(0) as u32..y1 {
            for x in rect.x.max(0) as u32..x1 {
                let p = frame.get_pixel(x, y).0;
                let g = gray.get_pixel(x, y).0[0] as f64;
                frame.put_pixel(
                    x,
                    y,
                    Rgb([
                        scale_channel(p[0] as f64 * alpha),
                        scale_channel(p[1] as f64 * alpha + g * beta),
                        scale_channel(p[2] as f64 * alpha),
                    ]),
                );
            }
        }
    }
}

fn scale_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_drawing_marks_the_border() {
        let overlay = Overlay::new(None);
        let mut frame = RgbImage::new(64, 64);
        overlay.draw_box(&mut frame, &FaceRect::new(10, 10, 20, 20), FOREHEAD_BOX_COLOR);
        assert_eq!(*frame.get_pixel(10, 10), FOREHEAD_BOX_COLOR);
        assert_eq!(*frame.get_pixel(29, 10), FOREHEAD_BOX_COLOR);
        // interior untouched
        assert_eq!(*frame.get_pixel(15, 15), Rgb([0, 0, 0]));
    }

    #[test]
    fn degenerate_box_is_skipped() {
        let overlay = Overlay::new(None);
        let mut frame = RgbImage::new(16, 16);
        overlay.draw_box(&mut frame, &FaceRect::new(4, 4, 0, 5), FACE_BOX_COLOR);
        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn pulse_blend_scales_channels() {
        let overlay = Overlay::new(None);
        let mut frame = RgbImage::from_pixel(8, 8, Rgb([100, 100, 100]));
        let gray = GrayImage::from_pixel(8, 8, image::Luma([200]));
        let rect = FaceRect::new(0, 0, 8, 8);

        overlay.pulse_blend(&mut frame, &gray, &rect, 0.5);
        let p = frame.get_pixel(4, 4).0;
        assert_eq!(p[0], 50);
        assert_eq!(p[1], 150); // 0.5 * 100 + 0.5 * 200
        assert_eq!(p[2], 50);
    }

    #[test]
    fn full_alpha_blend_is_identity() {
        let overlay = Overlay::new(None);
        let mut frame = RgbImage::from_pixel(8, 8, Rgb([90, 120, 150]));
        let gray = GrayImage::from_pixel(8, 8, image::Luma([10]));
        let rect = FaceRect::new(0, 0, 8, 8);

        overlay.pulse_blend(&mut frame, &gray, &rect, 1.0);
        assert_eq!(frame.get_pixel(0, 0).0, [90, 120, 150]);
    }

    #[test]
    fn text_without_font_is_a_noop() {
        let overlay = Overlay::new(None);
        let mut frame = RgbImage::new(64, 64);
        overlay.guide_lines(&mut frame, &["searching for face"]);
        overlay.status_label(&mut frame, "72.0 BPM", 5, 5);
        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }
}
