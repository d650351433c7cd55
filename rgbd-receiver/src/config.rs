//! Receiver configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rgbd_core::DepthFormat;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the receiver.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Depth decoding and dumping.
    pub depth: DepthConfig,
    /// Periodic statistics.
    pub stats: StatsConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to accept senders on.
    pub listen_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthConfig {
    /// Encoding the sender uses; it is not announced on the wire.
    pub format: DepthFormat,
    /// Directory for decoded depth frames as 16-bit PNG. Empty disables.
    pub dump_dir: String,
    /// Dump every Nth depth frame.
    pub dump_every: u32,
    /// Directory for 8-bit preview PNGs. Empty disables.
    pub preview_dir: String,
    /// Depth rendered black in the preview, in meters.
    pub depth_min_m: f32,
    /// Depth rendered white in the preview, in meters.
    pub depth_max_m: f32,
    /// Render near as white and far as black.
    pub invert: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Seconds between statistics lines. 0 disables them.
    pub interval_secs: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8888".into(),
        }
    }
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            format: DepthFormat::Png16,
            dump_dir: String::new(),
            dump_every: 15,
            preview_dir: String::new(),
            depth_min_m: 0.3,
            depth_max_m: 5.0,
            invert: false,
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
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

impl ReceiverConfig {
    /// Load from a TOML file, falling back to defaults.
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

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.network.listen_address.parse()
    }

    pub fn dump_dir(&self) -> Option<PathBuf> {
        let dir = self.depth.dump_dir.trim();
        (!dir.is_empty()).then(|| PathBuf::from(dir))
    }

    pub fn preview_dir(&self) -> Option<PathBuf> {
        let dir = self.depth.preview_dir.trim();
        (!dir.is_empty()).then(|| PathBuf::from(dir))
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats.interval_secs > 0).then(|| Duration::from_secs(self.stats.interval_secs))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = ReceiverConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("listen_address"));
        assert!(text.contains("format = \"png16\""));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = ReceiverConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ReceiverConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.listen_addr().unwrap().port(), 8888);
        assert_eq!(parsed.depth.dump_every, 15);
        assert_eq!(parsed.depth.depth_min_m, 0.3);
        assert_eq!(parsed.depth.depth_max_m, 5.0);
        assert!(!parsed.depth.invert);
    }

    #[test]
    fn partial_depth_section_keeps_defaults() {
        let parsed: ReceiverConfig =
            toml::from_str("[depth]\ninvert = true\ndepth_max_m = 3.5\n").unwrap();
        assert!(parsed.depth.invert);
        assert_eq!(parsed.depth.depth_max_m, 3.5);
        assert_eq!(parsed.depth.depth_min_m, 0.3);
        assert!(parsed.preview_dir().is_none());
    }

    #[test]
    fn optional_features() {
        let mut cfg = ReceiverConfig::default();
        assert!(cfg.dump_dir().is_none());
        assert!(cfg.preview_dir().is_none());
        assert_eq!(cfg.stats_interval(), Some(Duration::from_secs(5)));

        cfg.depth.dump_dir = "/tmp/depth".into();
        cfg.depth.preview_dir = " /tmp/preview ".into();
        cfg.stats.interval_secs = 0;
        assert_eq!(cfg.dump_dir(), Some(PathBuf::from("/tmp/depth")));
        assert_eq!(cfg.preview_dir(), Some(PathBuf::from("/tmp/preview")));
        assert!(cfg.stats_interval().is_none());
    }

    #[test]
    fn bad_listen_address() {
        let mut cfg = ReceiverConfig::default();
        cfg.network.listen_address = "nowhere".into();
        assert!(cfg.listen_addr().is_err());
    }
}
