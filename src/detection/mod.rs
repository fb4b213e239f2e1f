//! Face detection seam and box geometry.
//!
//! The detector itself is an external collaborator; this module defines the
//! pluggable trait it plugs into, the integer face box the rest of the
//! pipeline works in, and the forehead sub-region derivation.

pub mod tracker;

pub use tracker::FaceTracker;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Fractional forehead placement within the face box:
/// center-x, center-y, width, height as fractions of the box.
pub const FOREHEAD_FRACTIONS: (f64, f64, f64, f64) = (0.5, 0.18, 0.25, 0.15);

/// Detector tuning forwarded verbatim to the provider on every call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectorTuning {
    pub scale_factor: f64,
    pub min_neighbors: u32,
    /// Minimum accepted box side, in pixels.
    pub min_size: u32,
}

impl Default for DetectorTuning {
    fn default() -> Self {
        Self {
            scale_factor: 1.3,
            min_neighbors: 4,
            min_size: 50,
        }
    }
}

/// Pluggable face detection backend.
///
/// Given a grayscale frame and tuning parameters, returns zero or more
/// axis-aligned face bounding boxes.
pub trait FaceDetector: Send {
    fn detect(&mut self, gray: &GrayImage, tuning: &DetectorTuning) -> Vec<FaceRect>;
}

/// Supplies per-session detector instances. Detector state is not safely
/// shared between sessions, so each session creates its own.
pub trait DetectorProvider: Send + Sync {
    fn create(&self) -> Result<Box<dyn FaceDetector>>;
}

/// Detector that never finds a face. Sessions fall back to it when the
/// provider is unavailable, degrading to perpetual search instead of failing.
pub struct NullDetector;

impl FaceDetector for NullDetector {
    fn detect(&mut self, _gray: &GrayImage, _tuning: &DetectorTuning) -> Vec<FaceRect> {
        Vec::new()
    }
}

/// An axis-aligned face box in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// Reserved value meaning "no face was ever locked in".
pub const SENTINEL_RECT: FaceRect = FaceRect {
    x: 1,
    y: 1,
    w: 2,
    h: 2,
};

impl FaceRect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == SENTINEL_RECT
    }

    pub fn area(&self) -> i64 {
        self.w as i64 * self.h as i64
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + 0.5 * self.w as f64,
            self.y as f64 + 0.5 * self.h as f64,
        )
    }

    /// Derive a sub-rectangle placed at fractional offsets of this box,
    /// clipped to the frame and floored to at least 1x1.
    pub fn subregion(
        &self,
        (fx, fy, fw, fh): (f64, f64, f64, f64),
        frame_w: u32,
        frame_h: u32,
    ) -> FaceRect {
        let (x, y, w, h) = (self.x as f64, self.y as f64, self.w as f64, self.h as f64);
        let mut sx = (x + w * fx - w * fw / 2.0) as i32;
        let mut sy = (y + h * fy - h * fh / 2.0) as i32;
        let mut sw = (w * fw) as i32;
        let mut sh = (h * fh) as i32;

        sx = sx.max(0);
        sy = sy.max(0);
        sw = sw.max(1);
        sh = sh.max(1);
        if sx + sw > frame_w as i32 {
            sw = (frame_w as i32 - sx).max(1);
        }
        if sy + sh > frame_h as i32 {
            sh = (frame_h as i32 - sy).max(1);
        }
        FaceRect::new(sx, sy, sw, sh)
    }

    /// The skin sampling area: a fixed-fraction band across the forehead.
    pub fn forehead(&self, frame_w: u32, frame_h: u32) -> FaceRect {
        self.subregion(FOREHEAD_FRACTIONS, frame_w, frame_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_recognized() {
        assert!(SENTINEL_RECT.is_sentinel());
        assert!(!FaceRect::new(1, 1, 2, 3).is_sentinel());
        assert!(!FaceRect::new(0, 0, 100, 100).is_sentinel());
    }

    #[test]
    fn forehead_sits_inside_face() {
        let face = FaceRect::new(100, 100, 200, 200);
        let fh = face.forehead(640, 480);
        assert_eq!(fh.w, 50); // 0.25 of 200
        assert_eq!(fh.h, 30); // 0.15 of 200
        assert_eq!(fh.x, 175); // centered on x + 0.5 * w
        assert_eq!(fh.y, 121); // centered on y + 0.18 * h
    }

    #[test]
    fn forehead_width_is_clipped_at_the_frame_edge() {
        let face = FaceRect::new(560, 0, 200, 200);
        let fh = face.forehead(640, 480);
        assert_eq!(fh.x, 635);
        assert_eq!(fh.w, 5); // truncated at x = 640
        assert!(fh.h >= 1);
    }

    #[test]
    fn fully_out_of_frame_forehead_stays_degenerate() {
        // clipping floors the size to 1x1 but cannot move the origin back
        // inside; the sampling layer treats this as a degenerate region
        let face = FaceRect::new(700, 500, 200, 200);
        let fh = face.forehead(640, 480);
        assert!(fh.x >= 640 || fh.y >= 480);
        assert_eq!((fh.w, fh.h), (1, 1));
    }

    #[test]
    fn degenerate_face_still_yields_a_pixel() {
        let face = FaceRect::new(0, 0, 1, 1);
        let fh = face.forehead(640, 480);
        assert!(fh.w >= 1 && fh.h >= 1);
    }

    #[test]
    fn null_detector_finds_nothing() {
        let gray = GrayImage::new(64, 64);
        let mut det = NullDetector;
        assert!(det.detect(&gray, &DetectorTuning::default()).is_empty());
    }
}
