//! Per-stream orchestration: the detect, sample, estimate, annotate cycle.

pub mod manager;
pub mod types;

pub use manager::SessionManager;
pub use types::{CameraInfo, CurrentStats, FrameResult, SessionState, SessionSummary};

use std::io::Write;

use ab_glyph::FontArc;
use chrono::{DateTime, Utc};
use image::imageops::{self, FilterType};
use imageproc::contrast::equalize_histogram;
use log::{info, warn};
use uuid::Uuid;

use crate::config::PulseConfig;
use crate::detection::{
    DetectorProvider, FaceDetector, FaceRect, FaceTracker, NullDetector, SENTINEL_RECT,
};
use crate::dsp::{
    region_mean, Estimate, PulseEstimator, QualityScorer, SampleBuffer, SESSION_LOG_WEIGHTS,
    STREAMING_WEIGHTS,
};
use crate::error::{PulseError, Result};
use crate::input::{CaptureProvider, CapturedFrame};
use crate::render::{Overlay, FACE_BOX_COLOR, FOREHEAD_BOX_COLOR};

/// One camera stream's pulse estimation state machine.
///
/// Owns the capture source, the tracker, the sample buffer, and the
/// estimator; drives one full detect-sample-estimate-annotate cycle per
/// [`process_frame`](Self::process_frame) call. All computation happens
/// synchronously inside that call.
pub struct PulseSession {
    id: Uuid,
    camera_id: u32,
    config: PulseConfig,
    /// `None` once stopped; doubles as the inactive flag.
    source: Option<Box<dyn crate::input::FrameSource>>,
    tracker: FaceTracker,
    buffer: SampleBuffer,
    estimator: PulseEstimator,
    overlay: Overlay,
    streaming_quality: QualityScorer,
    logging_quality: QualityScorer,
    state: SessionState,
    face_rect: FaceRect,
    face_present: bool,
    last_face_at: f64,
    started_at: DateTime<Utc>,
    /// Every smoothed reading observed, for the end-of-session summary.
    bpm_history: Vec<f64>,
}

impl PulseSession {
    /// Acquire the capture device and initialize a searching session.
    /// Device-open failure is fatal; a missing detector is not — the session
    /// degrades to never seeing a face.
    pub fn open(
        camera_id: u32,
        bpm_limits: Option<(f64, f64)>,
        config: PulseConfig,
        capture: &dyn CaptureProvider,
        detectors: &dyn DetectorProvider,
        font: Option<FontArc>,
    ) -> Result<Self> {
        let band = bpm_limits.unwrap_or(config.bpm_band);
        if !(0.0 < band.0 && band.0 < band.1) {
            return Err(PulseError::InvalidBpmBand {
                lo: band.0,
                hi: band.1,
            });
        }

        let source = capture.open(camera_id)?;
        let detector: Box<dyn FaceDetector> = match detectors.create() {
            Ok(d) => d,
            Err(e) => {
                warn!("detector unavailable, degrading to searching forever: {e}");
                Box::new(NullDetector)
            }
        };

        let id = Uuid::new_v4();
        info!("session {id} started on camera {camera_id}, band {band:?}");
        Ok(Self {
            id,
            camera_id,
            source: Some(source),
            tracker: FaceTracker::new(
                detector,
                config.detector,
                config.smoothness,
                config.snap_threshold,
            ),
            buffer: SampleBuffer::new(config.buffer_size, config.spike_limit),
            estimator: PulseEstimator::new(band, config.min_spectral_samples),
            overlay: Overlay::new(font),
            streaming_quality: QualityScorer::new(STREAMING_WEIGHTS),
            logging_quality: QualityScorer::new(SESSION_LOG_WEIGHTS),
            state: SessionState::Searching,
            face_rect: SENTINEL_RECT,
            face_present: false,
            last_face_at: 0.0,
            started_at: Utc::now(),
            bpm_history: Vec::new(),
            config,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn camera_id(&self) -> u32 {
        self.camera_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    /// Current smoothed BPM, 0 before the first estimate.
    pub fn bpm(&self) -> f64 {
        self.estimator.bpm()
    }

    /// Capture-time offset of the most recent frame with a visible face.
    pub fn last_face_seen_at(&self) -> f64 {
        self.last_face_at
    }

    /// Flip between searching and locked. Does not clear buffers itself;
    /// frame processing does that, conditionally.
    pub fn toggle_lock(&mut self) -> SessionState {
        self.state = match self.state {
            SessionState::Searching => SessionState::Locked,
            SessionState::Locked => SessionState::Searching,
        };
        info!("session {} now {:?}", self.id, self.state);
        self.state
    }

    /// Run one full cycle on the next available frame. `Ok(None)` means no
    /// frame was available (or the session is stopped); the caller should
    /// wait briefly and poll again.
    pub fn process_frame(&mut self) -> Result<Option<FrameResult>> {
        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };
        let CapturedFrame {
            image: mut frame,
            timestamp,
        } = match source.read_frame() {
            Ok(Some(captured)) => captured,
            Ok(None) => return Ok(None),
            Err(e) => {
                // transient read failure: no result this cycle, the polling
                // cadence retries naturally
                warn!("frame read failed: {e}");
                return Ok(None);
            }
        };
        if frame.width() == 0 || frame.height() == 0 {
            warn!("discarding malformed {}x{} frame", frame.width(), frame.height());
            return Ok(None);
        }

        let gray = equalize_histogram(&imageops::grayscale(&frame));
        let estimate = match self.state {
            SessionState::Searching => self.run_searching(&mut frame, &gray, timestamp),
            SessionState::Locked => self.run_locked(&mut frame, &gray, timestamp),
        };

        let (out_w, out_h) = (self.config.frame_width, self.config.frame_height);
        if frame.dimensions() != (out_w, out_h) {
            frame = imageops::resize(&frame, out_w, out_h, FilterType::Triangle);
        }

        let bpm = self.estimator.bpm();
        Ok(Some(FrameResult {
            bpm: (bpm > 0.0).then_some(bpm),
            spectrum: estimate.map(|e| e.spectrum),
            raw_signal_tail: self.buffer.tail(self.config.stats_tail).1.to_vec(),
            quality: self
                .streaming_quality
                .score(self.face_present, self.buffer.fill_ratio(), bpm),
            face_detected: self.face_present,
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            frame,
        }))
    }

    fn run_searching(
        &mut self,
        frame: &mut image::RgbImage,
        gray: &image::GrayImage,
        now: f64,
    ) -> Option<Estimate> {
        // searching never accumulates a pulse signal, it only tracks the box
        self.buffer.clear();
        self.estimator.reset();

        match self.tracker.track(gray, self.face_rect) {
            Some(rect) => {
                self.face_rect = rect;
                self.face_present = true;
                self.last_face_at = now;
            }
            None => self.face_present = false,
        }

        let (w, h) = frame.dimensions();
        self.overlay.draw_box(frame, &self.face_rect, FACE_BOX_COLOR);
        self.overlay
            .draw_box(frame, &self.face_rect.forehead(w, h), FOREHEAD_BOX_COLOR);
        let camera_line = format!("camera {}: searching for face", self.camera_id);
        self.overlay.guide_lines(
            frame,
            &[
                camera_line.as_str(),
                "center your face and hold still",
                "lock on to begin measuring",
            ],
        );
        None
    }

    fn run_locked(
        &mut self,
        frame: &mut image::RgbImage,
        gray: &image::GrayImage,
        now: f64,
    ) -> Option<Estimate> {
        // locked without ever having locked a face: nothing to measure
        if self.face_rect.is_sentinel() {
            return None;
        }

        // liveness check only; the locked box stays frozen until re-search
        if self.tracker.scan(gray).is_empty() {
            self.face_present = false;
            self.estimator.reset();
            self.buffer.clear();
            return None;
        }
        self.face_present = true;
        self.last_face_at = now;

        let (w, h) = frame.dimensions();
        let forehead = self.face_rect.forehead(w, h);

        // degenerate region after clipping: reuse the last sample rather
        // than failing the cycle
        let value = region_mean(frame, &forehead)
            .or_else(|| self.buffer.last_value())
            .unwrap_or(0.0);
        self.buffer.push(now, value);

        self.overlay.draw_box(frame, &forehead, FOREHEAD_BOX_COLOR);
        let camera_line = format!("camera {}: measuring", self.camera_id);
        self.overlay
            .guide_lines(frame, &[camera_line.as_str(), "toggle lock to re-search"]);

        let estimate = self.estimator.estimate(&self.buffer)?;
        if let Some(smoothed) = estimate.bpm.smoothed {
            self.bpm_history.push(smoothed);
        }

        self.overlay
            .pulse_blend(frame, gray, &forehead, estimate.phase_blend);

        let bpm = self.estimator.bpm();
        let fps = self.estimator.fps();
        let pending = self.buffer.capacity().saturating_sub(self.buffer.len());
        let text = if pending > 0 && fps > 0.0 {
            format!("(estimate: {bpm:.1} bpm, wait {:.0} s)", pending as f64 / fps)
        } else {
            format!("{bpm:.1} BPM")
        };
        self.overlay
            .status_label(frame, &text, forehead.x - forehead.w / 2, forehead.y);
        Some(estimate)
    }

    /// Release the device and summarize the session. Any in-flight poll
    /// afterwards sees the inactive flag and yields no frame.
    pub fn stop(&mut self) -> Option<SessionSummary> {
        self.source = None;
        info!("session {} stopped", self.id);

        if self.bpm_history.is_empty() {
            return None;
        }
        let sum: f64 = self.bpm_history.iter().sum();
        let max = self.bpm_history.iter().fold(f64::MIN, |a, &b| a.max(b));
        let min = self.bpm_history.iter().fold(f64::MAX, |a, &b| a.min(b));
        Some(SessionSummary {
            session_id: self.id,
            start_time: self.started_at,
            duration_seconds: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
            avg_bpm: sum / self.bpm_history.len() as f64,
            max_bpm: max,
            min_bpm: min,
        })
    }

    /// Fully stop the current device, then acquire the new one. On failure
    /// the session is left stopped and the error propagates.
    pub fn switch_camera(&mut self, new_id: u32, capture: &dyn CaptureProvider) -> Result<()> {
        // release first: the device and detector state are not safely shared
        self.source = None;
        self.buffer.clear();
        self.estimator.reset();
        self.face_rect = SENTINEL_RECT;
        self.face_present = false;
        self.state = SessionState::Searching;

        self.source = Some(capture.open(new_id)?);
        info!("session {} switched to camera {new_id}", self.id);
        self.camera_id = new_id;
        Ok(())
    }

    /// Projection for the logging/stats path.
    pub fn current_stats(&self) -> CurrentStats {
        let (times, values) = self.buffer.tail(self.config.stats_tail);
        CurrentStats {
            bpm: self.estimator.bpm(),
            quality: self.logging_quality.score(
                self.state == SessionState::Searching,
                self.buffer.fill_ratio(),
                0.0,
            ),
            sample_count: self.buffer.len(),
            timestamps: times.to_vec(),
            raw_values: values.to_vec(),
        }
    }

    /// Two-column export of the full in-memory buffer: raw values, not the
    /// smoothed or derived ones. Returns the number of rows written.
    pub fn export_signal<W: Write>(&self, mut writer: W) -> Result<usize> {
        writeln!(writer, "timestamp,value")?;
        for (t, v) in self.buffer.times().iter().zip(self.buffer.values()) {
            writeln!(writer, "{t},{v}")?;
        }
        Ok(self.buffer.len())
    }
}
