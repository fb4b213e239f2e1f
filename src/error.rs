//! Library error taxonomy.
//!
//! A `thiserror` enum for every fallible library path; `anyhow` is used only
//! at the binary boundary. No panics in non-test code paths — all fallible
//! operations return [`Result`].

use thiserror::Error;

/// Crate-wide result alias over [`PulseError`].
pub type Result<T> = std::result::Result<T, PulseError>;

/// Recoverable and fatal error conditions surfaced by the library.
#[derive(Debug, Error)]
pub enum PulseError {
    /// Capture device could not be opened; fatal to `start`.
    #[error("failed to open capture device {id}: {reason}")]
    DeviceOpen { id: u32, reason: String },

    /// Detector provider could not produce a detector; the session degrades
    /// to a null detector rather than failing.
    #[error("detector unavailable: {0}")]
    DetectorUnavailable(String),

    /// A lifecycle operation was requested with no active session.
    #[error("no active session")]
    NoActiveSession,

    /// The requested BPM band is not a valid ordered positive interval.
    #[error("invalid BPM band: lo={lo}, hi={hi}")]
    InvalidBpmBand { lo: f64, hi: f64 },

    /// Signal export I/O failure.
    #[error("signal export failed: {0}")]
    Export(#[from] std::io::Error),
}
