//! Video input seam.
//!
//! The capture device is an external collaborator; the session only sees
//! these traits. A synthetic implementation lives in [`synthetic`] for the
//! demo binary and the test suite.

pub mod synthetic;

pub use synthetic::{SyntheticDetectorProvider, SyntheticProvider, SyntheticScene};

use image::RgbImage;

use crate::error::Result;

/// One captured frame with its capture-time offset, in seconds since the
/// stream was opened. Sources must hand out non-decreasing timestamps.
pub struct CapturedFrame {
    pub image: RgbImage,
    pub timestamp: f64,
}

/// An open camera stream. Dropping the source releases the device.
pub trait FrameSource: Send {
    /// The next frame, or `None` when nothing is available this cycle; the
    /// caller is expected to wait briefly and poll again rather than spin.
    fn read_frame(&mut self) -> Result<Option<CapturedFrame>>;
}

/// Opens capture devices by identifier.
pub trait CaptureProvider: Send + Sync {
    fn open(&self, id: u32) -> Result<Box<dyn FrameSource>>;

    /// Cheap availability probe used by the camera listing.
    fn is_available(&self, id: u32) -> bool;
}
