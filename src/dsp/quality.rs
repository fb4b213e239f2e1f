//! Signal-quality heuristic.
//!
//! One scorer, configurable by weight table. Historically the streaming and
//! the session-logging call sites computed different ad-hoc formulas from
//! overlapping inputs; both now feed through here. Neither is a calibrated
//! statistical measure.

use serde::{Deserialize, Serialize};

/// Term weights for the confidence score. `fill_gate`, when set, turns the
/// buffer-fill term into a pass/fail threshold on the fill ratio instead of
/// a linear contribution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeightTable {
    pub presence: f64,
    pub fill: f64,
    pub bpm: f64,
    pub fill_gate: Option<f64>,
}

/// Live-streaming weights: face presence, linear buffer fill, BPM validity.
pub const STREAMING_WEIGHTS: WeightTable = WeightTable {
    presence: 0.4,
    fill: 0.3,
    bpm: 0.3,
    fill_gate: None,
};

/// Session-log weights: the presence slot is fed with "search mode active"
/// at this call site, and the fill term is gated at 80% full.
pub const SESSION_LOG_WEIGHTS: WeightTable = WeightTable {
    presence: 0.5,
    fill: 0.5,
    bpm: 0.0,
    fill_gate: Some(0.8),
};

#[derive(Debug, Clone, Copy)]
pub struct QualityScorer {
    weights: WeightTable,
}

impl QualityScorer {
    pub fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    /// Combine the inputs into a confidence score, always in [0, 1].
    pub fn score(&self, presence: bool, fill_ratio: f64, bpm: f64) -> f64 {
        let w = &self.weights;
        let mut q = 0.0;
        if presence {
            q += w.presence;
        }
        q += w.fill
            * match w.fill_gate {
                Some(gate) => {
                    if fill_ratio > gate {
                        1.0
                    } else {
                        0.0
                    }
                }
                None => fill_ratio.clamp(0.0, 1.0),
            };
        if bpm > 0.0 {
            q += w.bpm;
        }
        q.clamp(0.0, 1.0)
    }
}
