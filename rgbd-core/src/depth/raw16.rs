//! Headerless little-endian `u16` millimeter array.
//!
//! No container and no dimensions: the decoder relies on width and height
//! supplied out of band.

use super::buffer::{DepthBuffer, sample_count};
use super::quantize::{millimeters_to_meters, quantize};
use crate::error::CodecError;

pub fn encode(buffer: &DepthBuffer) -> Vec<u8> {
    let mut out = Vec::with_capacity(buffer.len() * 2);
    for mm in quantize(buffer.samples()) {
        out.extend_from_slice(&mm.to_le_bytes());
    }
    out
}

pub fn decode(bytes: &[u8], width: u32, height: u32) -> Result<DepthBuffer, CodecError> {
    let expected = sample_count(width, height)? * 2;
    if bytes.len() != expected {
        return Err(CodecError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|c| millimeters_to_meters(u16::from_le_bytes([c[0], c[1]])))
        .collect();
    DepthBuffer::new(width, height, samples)
}
