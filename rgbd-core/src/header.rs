//! Fixed 18-byte packet header.
//!
//! ```text
//! offset  size  field
//!      0     1  frame type (RGB=0x01, DEPTH=0x02, METADATA=0x03)
//!      1     8  timestamp, f64 seconds
//!      9     4  frame number, u32
//!     13     4  payload length, u32
//!     17     1  key-frame flag (0 or 1)
//! ```
//!
//! Everything is little-endian. There is no magic and no version field, so
//! a reader that loses sync on a corrupted header cannot recover.

use std::fmt;

use crate::error::StreamError;

/// Encoded size of [`PacketHeader`] on the wire.
pub const HEADER_SIZE: usize = 18;

pub type HeaderBytes = [u8; HEADER_SIZE];

// ── FrameType ────────────────────────────────────────────────────

/// Kind of payload carried by a packet.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Already-compressed color image.
    Rgb = 0x01,
    /// Depth payload produced by the depth codec.
    Depth = 0x02,
    /// Session metadata, JSON text.
    Metadata = 0x03,
}

impl FrameType {
    /// Key-frame flag conventionally attached to this type.
    ///
    /// Color frames are independently decodable; depth and metadata are not
    /// flagged.
    pub const fn default_key_frame(self) -> bool {
        matches!(self, FrameType::Rgb)
    }
}

impl TryFrom<u8> for FrameType {
    type Error = StreamError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(FrameType::Rgb),
            0x02 => Ok(FrameType::Depth),
            0x03 => Ok(FrameType::Metadata),
            other => Err(StreamError::UnknownFrameType(other)),
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameType::Rgb => write!(f, "RGB"),
            FrameType::Depth => write!(f, "DEPTH"),
            FrameType::Metadata => write!(f, "METADATA"),
        }
    }
}

// ── PacketHeader ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketHeader {
    pub frame_type: FrameType,
    /// Seconds; wall-clock for metadata, capture-relative for frames.
    pub timestamp: f64,
    pub frame_number: u32,
    pub payload_length: u32,
    pub is_key_frame: bool,
}

impl PacketHeader {
    /// Serialize to bytes (little-endian).
    pub fn encode(&self) -> HeaderBytes {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.frame_type as u8;
        buf[1..9].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[9..13].copy_from_slice(&self.frame_number.to_le_bytes());
        buf[13..17].copy_from_slice(&self.payload_length.to_le_bytes());
        buf[17] = self.is_key_frame as u8;
        buf
    }

    /// Deserialize from the first [`HEADER_SIZE`] bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, StreamError> {
        let Some(bytes) = data.get(..HEADER_SIZE) else {
            return Err(StreamError::InvalidHeader("shorter than 18 bytes"));
        };

        let frame_type = FrameType::try_from(bytes[0])?;
        let is_key_frame = match bytes[17] {
            0 => false,
            1 => true,
            _ => return Err(StreamError::InvalidHeader("key-frame flag is not 0 or 1")),
        };

        Ok(Self {
            frame_type,
            timestamp: f64::from_le_bytes(le_array(&bytes[1..9])),
            frame_number: u32::from_le_bytes(le_array(&bytes[9..13])),
            payload_length: u32::from_le_bytes(le_array(&bytes[13..17])),
            is_key_frame,
        })
    }
}

/// Copy a slice whose length is fixed by the caller's range into an array.
fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

// ── Tests ────────────────────────────────────────────────────────
