//! Synthetic capture and detection endpoints.
//!
//! Generates frames with a static "face" whose forehead brightness
//! oscillates at a configured heart rate, plus a detector that reports that
//! face. Stands in for the external camera/detector pair in the demo binary
//! and the integration tests; the pipeline under test is the real one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detection::{DetectorProvider, DetectorTuning, FaceDetector, FaceRect};
use crate::error::{PulseError, Result};

use super::{CaptureProvider, CapturedFrame, FrameSource};

const BACKGROUND: u8 = 70;
const SKIN: u8 = 140;

/// Parameters of the generated scene.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    pub width: u32,
    pub height: u32,
    pub face: FaceRect,
    /// Simulated heart rate driving the forehead oscillation.
    pub bpm: f64,
    /// Timestamp spacing between frames.
    pub fps: f64,
    /// Peak-to-center intensity swing of the pulse signal.
    pub amplitude: f64,
    /// Uniform noise amplitude added per frame.
    pub noise: f64,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            face: FaceRect::new(240, 140, 160, 200),
            bpm: 72.0,
            fps: 30.0,
            amplitude: 20.0,
            noise: 1.0,
        }
    }
}

struct SyntheticCamera {
    scene: SyntheticScene,
    face_visible: Arc<AtomicBool>,
    frame_index: u64,
    rng: StdRng,
}

impl FrameSource for SyntheticCamera {
    fn read_frame(&mut self) -> Result<Option<CapturedFrame>> {
        let scene = &self.scene;
        let t = self.frame_index as f64 / scene.fps;
        self.frame_index += 1;

        let mut image =
            RgbImage::from_pixel(scene.width, scene.height, Rgb([BACKGROUND; 3]));

        if self.face_visible.load(Ordering::Relaxed) {
            fill(&mut image, &scene.face, SKIN);

            let hz = scene.bpm / 60.0;
            let pulse = scene.amplitude * (2.0 * std::f64::consts::PI * hz * t).sin();
            let noise = self.rng.gen_range(-scene.noise..=scene.noise);
            let level = (SKIN as f64 + pulse + noise).clamp(0.0, 255.0) as u8;
            let forehead = scene.face.forehead(scene.width, scene.height);
            fill(&mut image, &forehead, level);
        }

        Ok(Some(CapturedFrame {
            image,
            timestamp: t,
        }))
    }
}

fn fill(image: &mut RgbImage, rect: &FaceRect, level: u8) {
    let (w, h) = image.dimensions();
    let x1 = (rect.x + rect.w).clamp(0, w as i32) as u32;
    let y1 = (rect.y + rect.h).clamp(0, h as i32) as u32;
    for y in rect.y.max(0) as u32..y1 {
        for x in rect.x.max(0) as u32..x1 {
            image.put_pixel(x, y, Rgb([level; 3]));
        }
    }
}

/// Capture provider serving [`SyntheticCamera`] streams for a fixed set of
/// device ids. Face visibility is shared with the matching detector so tests
/// can take the face away mid-stream.
pub struct SyntheticProvider {
    scene: SyntheticScene,
    cameras: Vec<u32>,
    face_visible: Arc<AtomicBool>,
}

impl SyntheticProvider {
    pub fn new(scene: SyntheticScene) -> Self {
        Self {
            scene,
            cameras: vec![0, 1],
            face_visible: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn with_cameras(mut self, cameras: Vec<u32>) -> Self {
        self.cameras = cameras;
        self
    }

    /// Shared switch controlling whether the face is present in the scene.
    pub fn face_switch(&self) -> Arc<AtomicBool> {
        self.face_visible.clone()
    }

    /// Detector provider reporting this scene's face whenever visible.
    pub fn detector_provider(&self) -> SyntheticDetectorProvider {
        SyntheticDetectorProvider {
            face: self.scene.face,
            face_visible: self.face_visible.clone(),
        }
    }

    pub fn scene(&self) -> &SyntheticScene {
        &self.scene
    }
}

impl CaptureProvider for SyntheticProvider {
    fn open(&self, id: u32) -> Result<Box<dyn FrameSource>> {
        if !self.cameras.contains(&id) {
            return Err(PulseError::DeviceOpen {
                id,
                reason: "no such device".into(),
            });
        }
        Ok(Box::new(SyntheticCamera {
            scene: self.scene.clone(),
            face_visible: self.face_visible.clone(),
            frame_index: 0,
            rng: StdRng::seed_from_u64(id as u64),
        }))
    }

    fn is_available(&self, id: u32) -> bool {
        self.cameras.contains(&id)
    }
}

pub struct SyntheticDetectorProvider {
    face: FaceRect,
    face_visible: Arc<AtomicBool>,
}

impl DetectorProvider for SyntheticDetectorProvider {
    fn create(&self) -> Result<Box<dyn FaceDetector>> {
        Ok(Box::new(SyntheticDetector {
            face: self.face,
            face_visible: self.face_visible.clone(),
        }))
    }
}

struct SyntheticDetector {
    face: FaceRect,
    face_visible: Arc<AtomicBool>,
}

impl FaceDetector for SyntheticDetector {
    fn detect(&mut self, _gray: &image::GrayImage, _tuning: &DetectorTuning) -> Vec<FaceRect> {
        if self.face_visible.load(Ordering::Relaxed) {
            vec![self.face]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::region_mean;

    #[test]
    fn frames_carry_spaced_timestamps() {
        let provider = SyntheticProvider::new(SyntheticScene::default());
        let mut source = provider.open(0).unwrap();
        let first = source.read_frame().unwrap().unwrap();
        let second = source.read_frame().unwrap().unwrap();
        assert_eq!(first.timestamp, 0.0);
        assert!((second.timestamp - 1.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn forehead_oscillates_over_time() {
        let scene = SyntheticScene {
            noise: 0.0,
            ..SyntheticScene::default()
        };
        let forehead = scene.face.forehead(scene.width, scene.height);
        let provider = SyntheticProvider::new(scene);
        let mut source = provider.open(0).unwrap();

        let mut lo = f64::MAX;
        let mut hi = f64::MIN;
        for _ in 0..60 {
            let frame = source.read_frame().unwrap().unwrap();
            let mean = region_mean(&frame.image, &forehead).unwrap();
            lo = lo.min(mean);
            hi = hi.max(mean);
        }
        assert!(hi - lo > 10.0, "pulse swing too small: {} .. {}", lo, hi);
    }

    #[test]
    fn unknown_device_fails_to_open() {
        let provider = SyntheticProvider::new(SyntheticScene::default());
        assert!(provider.open(99).is_err());
        assert!(!provider.is_available(99));
        assert!(provider.is_available(0));
    }

    #[test]
    fn face_switch_hides_face_from_detector() {
        let provider = SyntheticProvider::new(SyntheticScene::default());
        let mut detector = provider.detector_provider().create().unwrap();
        let gray = image::GrayImage::new(8, 8);
        assert_eq!(
            detector.detect(&gray, &DetectorTuning::default()).len(),
            1
        );
        provider.face_switch().store(false, Ordering::Relaxed);
        assert!(detector.detect(&gray, &DetectorTuning::default()).is_empty());
    }
}
