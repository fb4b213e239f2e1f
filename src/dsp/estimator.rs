//! Frequency-domain BPM extraction.
//!
//! Converts the irregularly-sampled intensity buffer into a uniform signal,
//! takes its spectrum, and picks the dominant frequency inside the plausible
//! heart-rate band. Successive raw estimates are smoothed with an EMA.

use ndarray::Array1;
use num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::config::{BPM_EMA_ALPHA, PHASE_BLEND_FLOOR, PHASE_BLEND_GAIN};

use super::SampleBuffer;

/// Band-restricted power spectrum. Frequencies are expressed in beats per
/// minute; both sequences are index-aligned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Spectrum {
    pub freqs: Vec<f64>,
    pub power: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BpmEstimate {
    pub raw: f64,
    /// Exponential moving average over successive raw values; absent until
    /// the first raw estimate after a signal reset.
    pub smoothed: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Estimate {
    pub spectrum: Spectrum,
    pub bpm: BpmEstimate,
    /// Peak-phase-driven blend factor in [0.1, 1.0] for the heartbeat
    /// overlay; 0.5 whenever the band held no peak. Cosmetic only.
    pub phase_blend: f64,
}

pub struct PulseEstimator {
    band: (f64, f64),
    min_samples: usize,
    ema_alpha: f64,
    fps: f64,
    raw: f64,
    smoothed: Option<f64>,
}

impl PulseEstimator {
    pub fn new(band: (f64, f64), min_samples: usize) -> Self {
        Self {
            band,
            min_samples,
            ema_alpha: BPM_EMA_ALPHA,
            fps: 0.0,
            raw: 0.0,
            smoothed: None,
        }
    }

    /// Current BPM reading: the smoothed estimate, or 0 before any exists.
    pub fn bpm(&self) -> f64 {
        self.smoothed.unwrap_or(0.0)
    }

    /// Effective sampling rate derived from the last run.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn band(&self) -> (f64, f64) {
        self.band
    }

    /// Forget the raw/smoothed readings. Called whenever the sample buffer
    /// is cleared; the derived sampling rate is kept as a fallback.
    pub fn reset(&mut self) {
        self.raw = 0.0;
        self.smoothed = None;
    }

    /// Run one spectral pass over the buffer. Returns `None` while the
    /// buffer holds too few samples; callers keep their previous reading.
    pub fn estimate(&mut self, buffer: &SampleBuffer) -> Option<Estimate> {
        let n = buffer.len();
        if n <= self.min_samples {
            return None;
        }

        let times = buffer.times();
        let values = buffer.values();
        let t0 = times[0];
        let span = times[n - 1] - t0;
        if span > 1e-6 {
            self.fps = n as f64 / span;
        }
        // below that span the previous rate is kept to avoid a division
        // blow-up; with no previous rate the band comes out empty

        // resample onto n evenly spaced instants across the buffer's span
        let step = span / (n - 1) as f64;
        let resampled: Vec<f64> = (0..n)
            .map(|i| lerp_at(t0 + step * i as f64, times, values))
            .collect();

        // Hamming window, then remove DC bias
        let window = hamming(n);
        let mut signal = Array1::from(resampled) * window;
        let mean = signal.mean().unwrap_or(0.0);
        signal.mapv_inplace(|v| v - mean);

        let mut bins: Vec<Complex64> = signal.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        FftPlanner::new().plan_fft_forward(n).process(&mut bins);

        // non-negative frequencies only, restricted to the BPM band
        let (lo, hi) = self.band;
        let bin_to_bpm = 60.0 * self.fps / n as f64;
        let mut spectrum = Spectrum::default();
        let mut peak: Option<(f64, f64, f64)> = None; // (power, bpm, phase)
        for (i, bin) in bins.iter().take(n / 2 + 1).enumerate() {
            let bpm = bin_to_bpm * i as f64;
            if bpm <= lo || bpm >= hi {
                continue;
            }
            let power = bin.norm();
            spectrum.freqs.push(bpm);
            spectrum.power.push(power);
            if peak.map_or(true, |(best, _, _)| power > best) {
                peak = Some((power, bpm, bin.arg()));
            }
        }

        let phase_blend = match peak {
            Some((_, bpm, phase)) => {
                self.raw = bpm;
                self.smoothed = Some(match self.smoothed {
                    None => bpm,
                    Some(prev) => self.ema_alpha * bpm + (1.0 - self.ema_alpha) * prev,
                });
                PHASE_BLEND_GAIN * ((phase.sin() + 1.0) / 2.0) + PHASE_BLEND_FLOOR
            }
            // empty band: hold the previous reading, neutral blend
            None => 0.5,
        };

        Some(Estimate {
            spectrum,
            bpm: BpmEstimate {
                raw: self.raw,
                smoothed: self.smoothed,
            },
            phase_blend,
        })
    }
}

fn hamming(n: usize) -> Array1<f64> {
    Array1::from_shape_fn(n, |i| {
        0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos()
    })
}

/// Linear interpolation over a non-decreasing `xs` series, clamped to the
/// end values outside its range.
fn lerp_at(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    if x <= xs[0] {
        return ys[0];
    }
    let last = xs.len() - 1;
    if x >= xs[last] {
        return ys[last];
    }
    // partition_point: first index with xs[i] > x, so the segment is [i-1, i]
    let i = xs.partition_point(|&t| t <= x);
    let (x0, x1) = (xs[i - 1], xs[i]);
    if x1 - x0 <= f64::EPSILON {
        return ys[i - 1];
    }
    ys[i - 1] + (ys[i] - ys[i - 1]) * (x - x0) / (x1 - x0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sine_buffer(bpm: f64, rate: f64, count: usize) -> SampleBuffer {
        let mut buf = SampleBuffer::new(count, f64::MAX);
        let hz = bpm / 60.0;
        for i in 0..count {
            let t = i as f64 / rate;
            buf.push(t, (2.0 * PI * hz * t).sin());
        }
        buf
    }

    #[test]
    fn hamming_window_shape() {
        let w = hamming(11);
        assert_relative_eq!(w[0], 0.08, epsilon = 0.01);
        assert_relative_eq!(w[10], 0.08, epsilon = 0.01);
        assert_relative_eq!(w[5], 1.0, epsilon = 0.01);
    }

    #[test]
    fn lerp_matches_endpoints_and_midpoints() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [0.0, 10.0, 0.0];
        assert_eq!(lerp_at(-1.0, &xs, &ys), 0.0);
        assert_eq!(lerp_at(0.5, &xs, &ys), 5.0);
        assert_eq!(lerp_at(1.5, &xs, &ys), 5.0);
        assert_eq!(lerp_at(3.0, &xs, &ys), 0.0);
    }

    #[test]
    fn recovers_72_bpm_sine() {
        let buf = sine_buffer(72.0, 30.0, 300);
        let mut est = PulseEstimator::new((50.0, 180.0), 10);
        let out = est.estimate(&buf).expect("enough samples");
        assert!(
            (out.bpm.raw - 72.0).abs() < 2.0,
            "expected ~72 bpm, got {}",
            out.bpm.raw
        );
        assert_eq!(out.bpm.smoothed, Some(out.bpm.raw));
        assert!(out.phase_blend >= 0.1 && out.phase_blend <= 1.0);
    }

    #[test]
    fn spectrum_stays_inside_band() {
        let buf = sine_buffer(72.0, 30.0, 300);
        let mut est = PulseEstimator::new((50.0, 180.0), 10);
        let out = est.estimate(&buf).unwrap();
        assert!(!out.spectrum.freqs.is_empty());
        assert_eq!(out.spectrum.freqs.len(), out.spectrum.power.len());
        assert!(out
            .spectrum
            .freqs
            .iter()
            .all(|&f| f > 50.0 && f < 180.0));
    }

    #[test]
    fn smoothing_stays_within_raw_history_hull() {
        let mut est = PulseEstimator::new((50.0, 180.0), 10);
        let first = est.estimate(&sine_buffer(72.0, 30.0, 300)).unwrap();
        let second = est.estimate(&sine_buffer(96.0, 30.0, 300)).unwrap();

        let (lo, hi) = (
            first.bpm.raw.min(second.bpm.raw),
            first.bpm.raw.max(second.bpm.raw),
        );
        let smoothed = second.bpm.smoothed.unwrap();
        assert!(smoothed >= lo && smoothed <= hi);
        assert_relative_eq!(
            smoothed,
            0.7 * second.bpm.raw + 0.3 * first.bpm.raw,
            epsilon = 1e-9
        );
    }

    #[test]
    fn too_few_samples_yields_nothing() {
        let buf = sine_buffer(72.0, 30.0, 10);
        let mut est = PulseEstimator::new((50.0, 180.0), 10);
        assert!(est.estimate(&buf).is_none());
    }

    #[test]
    fn empty_band_holds_previous_reading() {
        let buf = sine_buffer(72.0, 30.0, 300);
        // a band entirely above the representable frequencies
        let mut est = PulseEstimator::new((2000.0, 3000.0), 10);
        let out = est.estimate(&buf).unwrap();
        assert!(out.spectrum.freqs.is_empty());
        assert_eq!(out.bpm.raw, 0.0);
        assert_eq!(out.bpm.smoothed, None);
        assert_eq!(out.phase_blend, 0.5);
        assert_eq!(est.bpm(), 0.0);
    }

    #[test]
    fn zero_span_keeps_previous_rate() {
        let mut est = PulseEstimator::new((50.0, 180.0), 10);
        est.estimate(&sine_buffer(72.0, 30.0, 300)).unwrap();
        let fps = est.fps();
        assert!(fps > 0.0);

        // degenerate buffer: every sample at the same instant
        let mut frozen = SampleBuffer::new(32, f64::MAX);
        for _ in 0..20 {
            frozen.push(5.0, 1.0);
        }
        est.estimate(&frozen);
        assert_eq!(est.fps(), fps);
    }

    #[test]
    fn reset_clears_readings() {
        let mut est = PulseEstimator::new((50.0, 180.0), 10);
        est.estimate(&sine_buffer(72.0, 30.0, 300)).unwrap();
        assert!(est.bpm() > 0.0);
        est.reset();
        assert_eq!(est.bpm(), 0.0);
        let out = est.estimate(&sine_buffer(96.0, 30.0, 300)).unwrap();
        // smoothing restarts from the fresh raw value
        assert_eq!(out.bpm.smoothed, Some(out.bpm.raw));
    }
}
