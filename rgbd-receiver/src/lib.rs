//! # rgbd-receiver: RGB-D stream receiver
//!
//! Listens for a sender, reads its framed RGB / DEPTH / METADATA stream,
//! logs the session description and periodic throughput, decodes depth
//! with the dimensions announced in the handshake, and optionally writes
//! decoded depth frames to disk as 16-bit PNG and as 8-bit previews over a
//! fixed near/far range.

pub mod config;
pub mod preview;
pub mod service;
