//! Signal path: rolling sample storage, spectral BPM extraction, and the
//! quality heuristic.

pub mod buffer;
pub mod estimator;
pub mod quality;

pub use buffer::SampleBuffer;
pub use estimator::{BpmEstimate, Estimate, PulseEstimator, Spectrum};
pub use quality::{QualityScorer, WeightTable, SESSION_LOG_WEIGHTS, STREAMING_WEIGHTS};

use image::RgbImage;

use crate::detection::FaceRect;

/// Mean intensity across all three color channels inside `rect`, or `None`
/// when no pixel of the rect lies inside the frame.
pub fn region_mean(frame: &RgbImage, rect: &FaceRect) -> Option<f64> {
    let (width, height) = frame.dimensions();
    let x0 = rect.x.max(0) as u32;
    let y0 = rect.y.max(0) as u32;
    let x1 = (rect.x + rect.w).clamp(0, width as i32) as u32;
    let y1 = (rect.y + rect.h).clamp(0, height as i32) as u32;
    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    let mut sum = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let p = frame.get_pixel(x, y).0;
            sum += p[0] as u64 + p[1] as u64 + p[2] as u64;
        }
    }
    let count = ((x1 - x0) as u64 * (y1 - y0) as u64) * 3;
    Some(sum as f64 / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn region_mean_averages_all_channels() {
        let mut frame = RgbImage::new(10, 10);
        for p in frame.pixels_mut() {
            *p = Rgb([30, 60, 90]);
        }
        let rect = FaceRect::new(2, 2, 4, 4);
        assert_eq!(region_mean(&frame, &rect), Some(60.0));
    }

    #[test]
    fn region_mean_ignores_out_of_frame_parts() {
        let mut frame = RgbImage::new(10, 10);
        for p in frame.pixels_mut() {
            *p = Rgb([100, 100, 100]);
        }
        let rect = FaceRect::new(8, 8, 10, 10);
        assert_eq!(region_mean(&frame, &rect), Some(100.0));
    }

    #[test]
    fn fully_outside_rect_is_degenerate() {
        let frame = RgbImage::new(10, 10);
        let rect = FaceRect::new(20, 20, 5, 5);
        assert_eq!(region_mean(&frame, &rect), None);
    }
}
