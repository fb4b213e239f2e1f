//! Camera-based heart rate estimation.
//!
//! Tracks a face region in a live video feed, samples color intensity from
//! the forehead, and extracts the dominant periodic component of that signal
//! via spectral analysis. The capture device and the face detector are
//! external collaborators plugged in through the [`input`] and [`detection`]
//! traits; everything else — tracking, buffering, estimation, annotation,
//! session lifecycle — lives here and runs synchronously inside one
//! `process_frame` call per incoming frame.

pub mod config;
pub mod detection;
pub mod dsp;
pub mod error;
pub mod input;
pub mod render;
pub mod session;

pub use config::PulseConfig;
pub use detection::{DetectorProvider, DetectorTuning, FaceDetector, FaceRect, FaceTracker};
pub use dsp::{BpmEstimate, PulseEstimator, QualityScorer, SampleBuffer, Spectrum};
pub use error::{PulseError, Result};
pub use input::{CaptureProvider, CapturedFrame, FrameSource};
pub use session::{
    CameraInfo, CurrentStats, FrameResult, PulseSession, SessionManager, SessionState,
    SessionSummary,
};

/// UTC timestamp string for generated file names.
pub fn timestamp_slug(delimiter: &str) -> String {
    let fmt = format!(
        "%Y-%m-%d{d}%H{d}%M{d}%S",
        d = delimiter
    );
    chrono::Utc::now().format(&fmt).to_string()
}
