//! Domain-specific error types for the RGB-D streaming core.
//!
//! Codec failures and stream failures are separate enums: the depth codec
//! runs on the hot per-frame path and its caller decides whether to drop
//! the frame, while stream errors end up on the status channel.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

// ── CodecError ───────────────────────────────────────────────────

/// Failure to compress or decompress a depth buffer.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The source buffer could not be read as a `width × height` grid.
    #[error("unreadable depth buffer: {0}")]
    UnreadableBuffer(&'static str),

    /// Sample count does not match the declared dimensions.
    #[error("dimension mismatch: {width}x{height} needs {expected} samples, got {actual}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Encoded bytes are shorter or longer than the dimensions require.
    #[error("truncated depth payload: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// The image container reports a size other than the tagged one.
    #[error("raster is {actual_width}x{actual_height}, expected {width}x{height}")]
    RasterSize {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// The underlying PNG/JPEG encoder or decoder rejected the data.
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
}

// ── StreamError ──────────────────────────────────────────────────

/// The canonical error type for framing, connection and handshake.
#[derive(Debug, Error)]
pub enum StreamError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// The frame type byte does not map to RGB, DEPTH or METADATA.
    #[error("unknown frame type: {0:#04x}")]
    UnknownFrameType(u8),

    /// A field in the packet header could not be parsed.
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    /// A lifecycle transition was attempted from the wrong state.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Packet Errors ────────────────────────────────────────────
    /// The payload exceeds what the header or the reader accepts.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// Port outside 1..=65535.
    #[error("invalid port: {0}")]
    InvalidPort(u32),

    /// Host string was empty.
    #[error("invalid host: {0:?}")]
    InvalidHost(String),

    /// The streamer's worker task is gone.
    #[error("channel closed")]
    ChannelClosed,

    // ── Serialization Errors ─────────────────────────────────────
    /// Session metadata failed to serialize or parse.
    #[error("metadata encoding error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Session metadata violates a field constraint.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(&'static str),

    // ── Codec Errors ─────────────────────────────────────────────
    /// A depth payload could not be encoded or decoded.
    #[error("depth codec: {0}")]
    Codec(#[from] CodecError),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for StreamError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        StreamError::ChannelClosed
    }
}
