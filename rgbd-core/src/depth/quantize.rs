//! Meter ↔ millimeter quantization shared by PNG16 and RAW16.
//!
//! Zero is the invalid sentinel. A genuine reading that quantizes to 0 mm
//! cannot be told apart from "no measurement"; this is inherent to both
//! formats.

use super::buffer::is_valid_depth;

pub const INVALID_DEPTH_MM: u16 = 0;

const MM_PER_METER: f64 = 1000.0;

/// Quantize one sample, clamping to `0..=65535` mm (65.535 m).
#[inline]
pub fn meters_to_millimeters(meters: f32) -> u16 {
    if !is_valid_depth(meters) {
        return INVALID_DEPTH_MM;
    }
    let mm = (meters as f64 * MM_PER_METER).round();
    mm.min(u16::MAX as f64) as u16
}

#[inline]
pub fn millimeters_to_meters(mm: u16) -> f32 {
    (mm as f64 / MM_PER_METER) as f32
}

pub fn quantize(samples: &[f32]) -> Vec<u16> {
    samples.iter().map(|&d| meters_to_millimeters(d)).collect()
}

pub fn dequantize(millimeters: &[u16]) -> Vec<f32> {
    millimeters.iter().map(|&mm| millimeters_to_meters(mm)).collect()
}
