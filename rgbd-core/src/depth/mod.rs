//! # Depth codec
//!
//! Stateless, pure conversion of a [`DepthBuffer`] to and from one of three
//! wire representations:
//!
//! | Format  | Container            | Precision                     | Size    |
//! |---------|----------------------|-------------------------------|---------|
//! | `Png16` | 16-bit gray PNG      | 1 mm, clamped at 65.535 m     | small   |
//! | `Jpeg8` | 8-bit gray JPEG, q80 | per-frame relative, lossy     | smaller |
//! | `Raw16` | none, LE `u16` array | 1 mm, clamped at 65.535 m     | `2·w·h` |
//!
//! In every format an invalid sample (zero, negative, NaN, infinite) turns
//! into 0, and 0 is also what a real 0 mm reading would produce.
//!
//! The codec never mutates its input and never panics on bad data; it is
//! safe to run on a worker concurrently with the network writer.

pub mod buffer;
pub mod jpeg8;
pub mod png16;
pub mod quantize;
pub mod raw16;
mod raster;

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

pub use buffer::{DepthBuffer, is_valid_depth};

// ── DepthFormat ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthFormat {
    #[default]
    Png16,
    Jpeg8,
    Raw16,
}

impl DepthFormat {
    /// Whether decoding gives back absolute meters.
    pub const fn preserves_scale(self) -> bool {
        !matches!(self, DepthFormat::Jpeg8)
    }
}

impl fmt::Display for DepthFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepthFormat::Png16 => write!(f, "png16"),
            DepthFormat::Jpeg8 => write!(f, "jpeg8"),
            DepthFormat::Raw16 => write!(f, "raw16"),
        }
    }
}

impl FromStr for DepthFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png16" | "png" => Ok(DepthFormat::Png16),
            "jpeg8" | "jpeg" | "jpg" => Ok(DepthFormat::Jpeg8),
            "raw16" | "raw" => Ok(DepthFormat::Raw16),
            other => Err(format!("unknown depth format: {other}")),
        }
    }
}

// ── EncodedDepth ─────────────────────────────────────────────────

/// Compressed depth bytes together with the format and grid size needed to
/// decode them. The format travels with the bytes; it is never sniffed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedDepth {
    pub format: DepthFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Bytes,
}

impl EncodedDepth {
    pub fn new(format: DepthFormat, width: u32, height: u32, bytes: impl Into<Bytes>) -> Self {
        Self {
            format,
            width,
            height,
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The wire payload; format and size are dropped.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

// ── CompressionInfo ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionInfo {
    /// Size of the `Float32` source buffer.
    pub original_size: usize,
    pub compressed_size: usize,
    /// `original_size / compressed_size`.
    pub ratio: f64,
}

// ── DepthCodec ───────────────────────────────────────────────────

pub struct DepthCodec;

impl DepthCodec {
    pub fn compress(buffer: &DepthBuffer, format: DepthFormat) -> Result<EncodedDepth, CodecError> {
        // Re-check the grid: a buffer is only readable if it is non-empty and
        // consistent with its own dimensions.
        let expected = buffer::sample_count(buffer.width(), buffer.height())?;
        if expected != buffer.len() {
            return Err(CodecError::DimensionMismatch {
                width: buffer.width(),
                height: buffer.height(),
                expected,
                actual: buffer.len(),
            });
        }

        let bytes = match format {
            DepthFormat::Png16 => png16::encode(buffer)?,
            DepthFormat::Jpeg8 => jpeg8::encode(buffer)?,
            DepthFormat::Raw16 => raw16::encode(buffer),
        };
        Ok(EncodedDepth::new(
            format,
            buffer.width(),
            buffer.height(),
            bytes,
        ))
    }

    pub fn decompress(encoded: &EncodedDepth) -> Result<DepthBuffer, CodecError> {
        let (w, h) = (encoded.width, encoded.height);
        match encoded.format {
            DepthFormat::Png16 => png16::decode(&encoded.bytes, w, h),
            DepthFormat::Jpeg8 => jpeg8::decode(&encoded.bytes, w, h),
            DepthFormat::Raw16 => raw16::decode(&encoded.bytes, w, h),
        }
    }

    /// Compress once and report how much smaller the payload got.
    pub fn compression_info(
        buffer: &DepthBuffer,
        format: DepthFormat,
    ) -> Result<CompressionInfo, CodecError> {
        let encoded = Self::compress(buffer, format)?;
        let original_size = buffer.byte_len();
        let compressed_size = encoded.len();
        let ratio = if compressed_size == 0 {
            0.0
        } else {
            original_size as f64 / compressed_size as f64
        };
        Ok(CompressionInfo {
            original_size,
            compressed_size,
            ratio,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
