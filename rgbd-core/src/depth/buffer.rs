//! Depth grid as handed over by the capture layer.

use crate::error::CodecError;

/// A sample counts as a measurement only when finite and strictly positive.
#[inline]
pub fn is_valid_depth(meters: f32) -> bool {
    meters.is_finite() && meters > 0.0
}

/// `width × height` depth samples in meters, row-major.
///
/// Invalid samples (zero, negative, NaN, infinite) are kept as given; the
/// codec maps them to the zero sentinel on the way out.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    width: u32,
    height: u32,
    samples: Vec<f32>,
}

impl DepthBuffer {
    pub fn new(width: u32, height: u32, samples: Vec<f32>) -> Result<Self, CodecError> {
        let expected = sample_count(width, height)?;
        if samples.len() != expected {
            return Err(CodecError::DimensionMismatch {
                width,
                height,
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Build from a locked `Float32` pixel buffer exported as little-endian bytes.
    pub fn from_le_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, CodecError> {
        let expected = sample_count(width, height)?;
        if bytes.len() != expected * 4 {
            return Err(CodecError::Truncated {
                expected: expected * 4,
                actual: bytes.len(),
            });
        }

        let samples = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Every sample set to `meters`.
    pub fn filled(width: u32, height: u32, meters: f32) -> Result<Self, CodecError> {
        let count = sample_count(width, height)?;
        Self::new(width, height, vec![meters; count])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Number of samples that hold a real measurement.
    pub fn valid_count(&self) -> usize {
        self.samples.iter().filter(|&&d| is_valid_depth(d)).count()
    }

    /// Uncompressed size of the `Float32` source buffer.
    pub fn byte_len(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }
}

/// `width * height`, refusing empty or overflowing grids.
pub(crate) fn sample_count(width: u32, height: u32) -> Result<usize, CodecError> {
    if width == 0 || height == 0 {
        return Err(CodecError::UnreadableBuffer("zero width or height"));
    }
    (width as usize)
        .checked_mul(height as usize)
        .ok_or(CodecError::UnreadableBuffer("dimensions overflow"))
}
