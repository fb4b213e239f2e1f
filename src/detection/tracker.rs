//! Face-region tracking and smoothing.
//!
//! Runs the external detector each frame, keeps the reported box stable
//! under detector jitter, and snaps instead of lagging when the face makes
//! a large sudden move.

use image::GrayImage;
use log::debug;

use super::{DetectorTuning, FaceDetector, FaceRect};

pub struct FaceTracker {
    detector: Box<dyn FaceDetector>,
    tuning: DetectorTuning,
    /// Smoothing strength; the blend factor is `1 / max(1, smoothness)`.
    smoothness: f64,
    /// Center shift in pixels beyond which smoothing is bypassed.
    snap_threshold: f64,
    last_center: (f64, f64),
}

impl FaceTracker {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        tuning: DetectorTuning,
        smoothness: f64,
        snap_threshold: f64,
    ) -> Self {
        Self {
            detector,
            tuning,
            smoothness,
            snap_threshold,
            last_center: (0.0, 0.0),
        }
    }

    /// Raw detection pass, no state updates. Used by the locked-mode
    /// liveness check, which must not move the frozen face box.
    pub fn scan(&mut self, gray: &GrayImage) -> Vec<FaceRect> {
        self.detector.detect(gray, &self.tuning)
    }

    /// Detect and smooth against `previous`, returning the updated box, or
    /// `None` when no face is visible this frame. Presence bookkeeping is
    /// the caller's.
    pub fn track(&mut self, gray: &GrayImage, previous: FaceRect) -> Option<FaceRect> {
        let mut detected = self.detector.detect(gray, &self.tuning);
        if detected.is_empty() {
            return None;
        }

        // Largest face wins; stable sort keeps detector order on ties.
        detected.sort_by_key(FaceRect::area);
        let target = *detected.last()?;

        let shift = self.center_shift(target);
        if shift > self.snap_threshold {
            debug!("face moved {:.1}px, snapping to detection", shift);
            return Some(target);
        }

        let blend = 1.0 / self.smoothness.max(1.0);
        Some(FaceRect::new(
            blend_i32(previous.x, target.x, blend),
            blend_i32(previous.y, target.y, blend),
            blend_i32(previous.w, target.w, blend),
            blend_i32(previous.h, target.h, blend),
        ))
    }

    /// Euclidean distance between the detected center and the previously
    /// seen center; updates the stored center as a side effect.
    fn center_shift(&mut self, detected: FaceRect) -> f64 {
        let center = detected.center();
        let (dx, dy) = (center.0 - self.last_center.0, center.1 - self.last_center.1);
        self.last_center = center;
        (dx * dx + dy * dy).sqrt()
    }
}

fn blend_i32(previous: i32, detected: i32, blend: f64) -> i32 {
    ((1.0 - blend) * previous as f64 + blend * detected as f64) as i32
}
