//! Crate configuration.
//!
//! [`PulseConfig`] carries every tunable with a `Default` mirroring the
//! original deployment's settings, plus [`from_env`](PulseConfig::from_env)
//! overrides. All smoothing/blend constants are named configuration values,
//! not inline literals.

use serde::{Deserialize, Serialize};

use crate::detection::DetectorTuning;

/// EMA smoothing factor applied to successive raw BPM estimates.
pub const BPM_EMA_ALPHA: f64 = 0.7;
/// Gain of the phase-driven heartbeat overlay blend.
pub const PHASE_BLEND_GAIN: f64 = 0.9;
/// Floor of the phase-driven heartbeat overlay blend.
pub const PHASE_BLEND_FLOOR: f64 = 0.1;

/// Every tunable parameter of the pulse-estimation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Plausible heart-rate band, in BPM.
    pub bpm_band: (f64, f64),
    /// Rolling sample buffer capacity.
    pub buffer_size: usize,
    /// Jump above which a sample is clamped to the previous value.
    pub spike_limit: f64,
    /// Tracker smoothing strength; blend factor is `1 / max(1, smoothness)`.
    pub smoothness: f64,
    /// Center shift in pixels beyond which tracker smoothing is bypassed.
    pub snap_threshold: f64,
    /// Minimum buffered samples before a spectral estimate is attempted.
    pub min_spectral_samples: usize,
    /// Detector tuning forwarded to the provider each frame.
    pub detector: DetectorTuning,
    /// Annotated output frame width.
    pub frame_width: u32,
    /// Annotated output frame height.
    pub frame_height: u32,
    /// Number of trailing samples exposed in stats/result projections.
    pub stats_tail: usize,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            bpm_band: (50.0, 180.0),
            buffer_size: 250,
            spike_limit: 2500.0,
            smoothness: 10.0,
            snap_threshold: 10.0,
            min_spectral_samples: 10,
            detector: DetectorTuning::default(),
            frame_width: 640,
            frame_height: 480,
            stats_tail: 100,
        }
    }
}

impl PulseConfig {
    /// Start from [`Default`] and apply any present environment overrides,
    /// mirroring the original process configuration.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_parse("PULSE_BPM_MIN") {
            cfg.bpm_band.0 = v;
        }
        if let Some(v) = env_parse("PULSE_BPM_MAX") {
            cfg.bpm_band.1 = v;
        }
        if let Some(v) = env_parse("PULSE_BUFFER_SIZE") {
            cfg.buffer_size = v;
        }
        if let Some(v) = env_parse("PULSE_SPIKE_LIMIT") {
            cfg.spike_limit = v;
        }
        if let Some(v) = env_parse("PULSE_SMOOTHNESS") {
            cfg.smoothness = v;
        }
        cfg
    }
}

/// Parse an environment variable into `T`, yielding `None` when unset or
/// unparseable.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}
