//! # rgbd-core
//!
//! Core library for streaming RGB-D capture over TCP.
//!
//! This crate contains:
//! - **Depth codec**: `DepthCodec` turning metric depth maps into PNG16,
//!   JPEG8 or RAW16 payloads and back
//! - **Wire format**: `PacketHeader`, `FrameType`, `FramePacket` (18-byte
//!   little-endian header plus payload)
//! - **Codec**: `FrameCodec` for framed TCP I/O via `tokio_util`
//! - **Protocol**: `SessionMetadata`, the JSON handshake sent first on
//!   every connection
//! - **Network**: `FrameStreamer` (sending actor) and `FrameReceiver`
//! - **State**: `ConnectionState` lifecycle machine
//! - **Stats**: throughput accounting for both ends
//! - **Error**: `StreamError` / `CodecError`, `thiserror`-based

pub mod codec;
pub mod depth;
pub mod error;
pub mod header;
pub mod network;
pub mod packet;
pub mod protocol;
pub mod state;
pub mod stats;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::FrameCodec;
pub use depth::{CompressionInfo, DepthBuffer, DepthCodec, DepthFormat, EncodedDepth};
pub use error::{CodecError, StreamError};
pub use header::{FrameType, HEADER_SIZE, PacketHeader};
pub use network::{Endpoint, FrameReceiver, FrameStreamer, StatusReceiver, StreamStatus};
pub use packet::{FramePacket, MAX_PAYLOAD_SIZE};
pub use protocol::SessionMetadata;
pub use state::ConnectionState;
pub use stats::{StreamStats, ThroughputWindow};
