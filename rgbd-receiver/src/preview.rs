//! 8-bit depth preview.
//!
//! Maps metric depth onto 0..=255 over a fixed near/far window so frames
//! stay comparable over time (unlike JPEG8's per-frame range). Samples
//! outside the window clip to the nearest end; invalid samples stay 0.

use std::io::Cursor;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError};
use rgbd_core::DepthBuffer;
use rgbd_core::depth::quantize::{meters_to_millimeters, millimeters_to_meters};

use crate::config::DepthConfig;

/// Smallest window width; keeps a collapsed near/far pair from dividing by 0.
const MIN_RANGE_M: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthPreview {
    min_m: f32,
    max_m: f32,
    invert: bool,
}

impl DepthPreview {
    pub fn new(min_m: f32, max_m: f32, invert: bool) -> Self {
        Self {
            min_m,
            max_m,
            invert,
        }
    }

    pub fn from_config(depth: &DepthConfig) -> Self {
        Self::new(depth.depth_min_m, depth.depth_max_m, depth.invert)
    }

    /// Gray level for one sample. Depth is taken at millimeter precision,
    /// the same as it travels on the wire.
    pub fn level(&self, meters: f32) -> u8 {
        let mm = meters_to_millimeters(meters);
        if mm == 0 {
            return 0;
        }
        let range = (self.max_m - self.min_m).max(MIN_RANGE_M);
        let mut scaled = ((millimeters_to_meters(mm) - self.min_m) / range).clamp(0.0, 1.0);
        if self.invert {
            scaled = 1.0 - scaled;
        }
        (scaled * 255.0) as u8
    }

    /// Row-major gray levels for a whole frame.
    pub fn render(&self, depth: &DepthBuffer) -> Vec<u8> {
        depth.samples().iter().map(|&m| self.level(m)).collect()
    }

    /// Render and encode as an 8-bit grayscale PNG.
    pub fn encode_png(&self, depth: &DepthBuffer) -> Result<Vec<u8>, ImageError> {
        let gray = self.render(depth);
        let mut out = Cursor::new(Vec::new());
        PngEncoder::new(&mut out).write_image(
            &gray,
            depth.width(),
            depth.height(),
            ExtendedColorType::L8,
        )?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_maps_to_full_gray_range() {
        let preview = DepthPreview::new(0.3, 5.0, false);
        assert_eq!(preview.level(0.3), 0);
        assert_eq!(preview.level(5.0), 255);
        // (2.65 - 0.3) / 4.7 = 0.5, truncated.
        assert_eq!(preview.level(2.65), 127);
    }

    #[test]
    fn out_of_window_samples_clip() {
        let preview = DepthPreview::new(0.3, 5.0, false);
        assert_eq!(preview.level(0.1), 0);
        assert_eq!(preview.level(12.0), 255);
        assert_eq!(preview.level(100.0), 255);
    }

    #[test]
    fn invalid_samples_stay_black() {
        for invert in [false, true] {
            let preview = DepthPreview::new(0.3, 5.0, invert);
            assert_eq!(preview.level(0.0), 0);
            assert_eq!(preview.level(f32::NAN), 0);
            assert_eq!(preview.level(-1.0), 0);
            assert_eq!(preview.level(f32::INFINITY), 0);
            // Quantizes to 0 mm, which is the invalid sentinel.
            assert_eq!(preview.level(0.0004), 0);
        }
    }

    #[test]
    fn invert_flips_valid_samples() {
        let preview = DepthPreview::new(0.3, 5.0, true);
        assert_eq!(preview.level(0.3), 255);
        assert_eq!(preview.level(5.0), 0);
        assert_eq!(preview.level(0.1), 255);
    }

    #[test]
    fn collapsed_window_does_not_divide_by_zero() {
        let preview = DepthPreview::new(1.0, 1.0, false);
        assert_eq!(preview.level(0.5), 0);
        assert_eq!(preview.level(1.5), 255);
    }

    #[test]
    fn render_is_row_major_and_encodes() {
        let depth = DepthBuffer::new(3, 1, vec![f32::NAN, 0.3, 5.0]).unwrap();
        let preview = DepthPreview::new(0.3, 5.0, false);
        assert_eq!(preview.render(&depth), vec![0, 0, 255]);

        let png = preview.encode_png(&depth).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let decoded = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (3, 1));
        assert_eq!(decoded.into_raw(), vec![0, 0, 255]);
    }
}
