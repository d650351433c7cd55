//! Lossy 8-bit grayscale JPEG of per-frame normalized depth.
//!
//! Each frame is stretched over its own `[min, max]` of valid samples. That
//! range is not transmitted, so decoding yields relative depth only: good
//! enough for previews, useless for reconstruction. Callers that need the
//! absolute scale can send [`normalization_range`] alongside the payload
//! through their own channel.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};

use super::buffer::{DepthBuffer, is_valid_depth};
use super::raster;
use crate::error::CodecError;

/// Fixed encoder quality (0..=100).
pub const JPEG_QUALITY: u8 = 80;

/// Range used when a frame has no valid sample at all.
pub const DEFAULT_RANGE: (f32, f32) = (0.0, 10.0);

/// Min and max over the valid samples of this frame only.
pub fn normalization_range(buffer: &DepthBuffer) -> (f32, f32) {
    buffer
        .samples()
        .iter()
        .copied()
        .filter(|&d| is_valid_depth(d))
        .fold(None, |range: Option<(f32, f32)>, d| match range {
            None => Some((d, d)),
            Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        })
        .unwrap_or(DEFAULT_RANGE)
}

/// Map every sample onto `0..=255`; invalid samples become 0.
pub fn normalize(buffer: &DepthBuffer) -> Vec<u8> {
    let (min, max) = normalization_range(buffer);
    let range = max - min;

    buffer
        .samples()
        .iter()
        .map(|&d| {
            if !is_valid_depth(d) || range <= 0.0 {
                return 0;
            }
            ((d - min) / range * 255.0) as u8
        })
        .collect()
}

pub fn encode(buffer: &DepthBuffer) -> Result<Vec<u8>, CodecError> {
    let gray = normalize(buffer);

    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).write_image(
        &gray,
        buffer.width(),
        buffer.height(),
        ExtendedColorType::L8,
    )?;
    Ok(out.into_inner())
}

/// Decode through the shared raster path: `v * 257 / 1000` "meters".
///
/// The result is monotonic in the original depth but carries no absolute
/// scale.
pub fn decode(bytes: &[u8], width: u32, height: u32) -> Result<DepthBuffer, CodecError> {
    let widened = raster::decode_luma16(bytes, ImageFormat::Jpeg, width, height)?;
    let samples = widened.iter().map(|&v| v as f32 / 1000.0).collect();
    DepthBuffer::new(width, height, samples)
}
