//! Configuration for the sender.

use std::path::Path;

use rgbd_core::{DepthFormat, Endpoint, SessionMetadata, StreamError};
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SenderConfig {
    /// Where to stream to. Persisted with `--remember`.
    pub network: NetworkConfig,
    /// Capture and send rates, frame sizes.
    pub capture: CaptureConfig,
    /// Payload encodings.
    pub encoding: EncodingConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Receiver host name or IP address.
    pub host: String,
    /// Receiver TCP port (1-65535).
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Rate at which the source produces frames.
    pub capture_fps: u32,
    /// Upper bound on frames handed to the streamer per second.
    pub send_fps: u32,
    pub rgb_width: u32,
    pub rgb_height: u32,
    pub depth_width: u32,
    pub depth_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// `png16`, `jpeg8` or `raw16`.
    pub depth_format: DepthFormat,
    /// JPEG quality for color frames (1-100).
    pub rgb_quality: u8,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".into(),
            port: 8888,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_fps: 30,
            send_fps: 15,
            rgb_width: 640,
            rgb_height: 480,
            depth_width: 256,
            depth_height: 192,
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            depth_format: DepthFormat::Png16,
            rgb_quality: 70,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SenderConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current configuration, e.g. to remember the last host.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        Self::default().save(path)
    }

    /// Validated receiver address.
    pub fn endpoint(&self) -> Result<Endpoint, StreamError> {
        Endpoint::new(self.network.host.clone(), self.network.port)
    }

    /// Capture rate clamped to `1..=120`.
    pub fn capture_fps(&self) -> u32 {
        self.capture.capture_fps.clamp(1, 120)
    }

    /// Send rate clamped to `1..=capture_fps`.
    pub fn send_fps(&self) -> u32 {
        self.capture.send_fps.clamp(1, self.capture_fps())
    }

    /// Fresh handshake payload for a new connection attempt.
    pub fn session_metadata(&self) -> SessionMetadata {
        SessionMetadata::new(
            (self.capture.rgb_width, self.capture.rgb_height),
            (self.capture.depth_width, self.capture.depth_height),
            self.send_fps(),
            "jpeg",
        )
    }
}

// ── Tests ────────────────────────────────────────────────────────
