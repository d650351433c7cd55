//! Session handshake payload.
//!
//! ```text
//! Sender ──[METADATA #0, JSON]──► Receiver      (once, first on the wire)
//! Sender ──[RGB / DEPTH ...]────► Receiver      (continuous)
//! ```
//!
//! The payload is a flat JSON object with camelCase keys:
//! `sessionId`, `rgbWidth`, `rgbHeight`, `depthWidth`, `depthHeight`, `fps`,
//! `rgbBitrate` (always 0) and `rgbEncoding`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub session_id: String,
    pub rgb_width: u32,
    pub rgb_height: u32,
    pub depth_width: u32,
    pub depth_height: u32,
    pub fps: u32,
    /// Reserved; always 0.
    #[serde(default)]
    pub rgb_bitrate: u64,
    /// Tag of the color payload, e.g. `"jpeg"`.
    pub rgb_encoding: String,
}

impl SessionMetadata {
    /// New metadata with a freshly generated session id.
    pub fn new(
        rgb: (u32, u32),
        depth: (u32, u32),
        fps: u32,
        rgb_encoding: impl Into<String>,
    ) -> Self {
        Self {
            session_id: new_session_id(),
            rgb_width: rgb.0,
            rgb_height: rgb.1,
            depth_width: depth.0,
            depth_height: depth.1,
            fps,
            rgb_bitrate: 0,
            rgb_encoding: rgb_encoding.into(),
        }
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.session_id.is_empty() {
            return Err(StreamError::InvalidMetadata("empty session id"));
        }
        if self.rgb_width == 0 || self.rgb_height == 0 {
            return Err(StreamError::InvalidMetadata("rgb dimensions must be positive"));
        }
        if self.depth_width == 0 || self.depth_height == 0 {
            return Err(StreamError::InvalidMetadata(
                "depth dimensions must be positive",
            ));
        }
        if self.fps == 0 {
            return Err(StreamError::InvalidMetadata("fps must be positive"));
        }
        if self.rgb_encoding.is_empty() {
            return Err(StreamError::InvalidMetadata("empty rgb encoding"));
        }
        Ok(())
    }

    /// Validate, then serialize to the JSON payload.
    pub fn to_payload(&self) -> Result<Vec<u8>, StreamError> {
        self.validate()?;
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_payload(bytes: &[u8]) -> Result<Self, StreamError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// 32 hex chars, unique per process and wall-clock instant.
fn new_session_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut hasher = blake3::Hasher::new();
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&seq.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    hasher.finalize().to_hex().as_str()[..32].to_string()
}
