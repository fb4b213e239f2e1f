//! Session-facing data types handed to the transport layer.

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dsp::Spectrum;

/// Face-lock state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Tracking and smoothing the face box; no pulse signal accumulates.
    Searching,
    /// Face box frozen; the forehead region feeds the sample buffer.
    Locked,
}

/// Emitted once when a session ends, if any BPM readings were observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub avg_bpm: f64,
    pub max_bpm: f64,
    pub min_bpm: f64,
}

/// Point-in-time projection for the logging/stats path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentStats {
    pub bpm: f64,
    pub quality: f64,
    pub sample_count: usize,
    pub timestamps: Vec<f64>,
    pub raw_values: Vec<f64>,
}

/// Availability of one capture device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraInfo {
    pub id: u32,
    pub name: String,
    pub available: bool,
}

/// Output of one `process_frame` call.
#[derive(Debug)]
pub struct FrameResult {
    /// The annotated frame, resized to the configured output dimensions.
    pub frame: RgbImage,
    /// Smoothed BPM, present once a positive reading exists.
    pub bpm: Option<f64>,
    /// Band-restricted spectrum from this frame's estimator run, if any.
    pub spectrum: Option<Spectrum>,
    /// Trailing raw intensity samples for live plotting.
    pub raw_signal_tail: Vec<f64>,
    /// Streaming-policy confidence score in [0, 1].
    pub quality: f64,
    pub face_detected: bool,
    /// Wall-clock time of the processing call, seconds since the epoch.
    pub timestamp: f64,
}
