//! RGB-D receiver: entry point.
//!
//! ```text
//! rgbd-receiver                          Listen with defaults
//! rgbd-receiver --listen 0.0.0.0:9000    Override the listen address
//! rgbd-receiver --dump-dir frames/       Write decoded depth as PNG16
//! rgbd-receiver --preview-dir view/      Write 8-bit previews (0.3-5.0 m)
//! rgbd-receiver --preview-dir view/ --depth-max 2.5 --invert
//! rgbd-receiver --config <path>          Use custom config TOML
//! rgbd-receiver --gen-config             Dump default config and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use rgbd_core::DepthFormat;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rgbd_receiver::config::ReceiverConfig;
use rgbd_receiver::service::ReceiverService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rgbd-receiver", about = "Receive and inspect an RGB-D stream")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "rgbd-receiver.toml")]
    config: PathBuf,

    /// Listen address (overrides config). Example: 0.0.0.0:8888
    #[arg(short, long)]
    listen: Option<String>,

    /// Depth encoding used by the sender (overrides config).
    #[arg(long)]
    depth_format: Option<DepthFormat>,

    /// Directory for decoded depth PNGs (overrides config).
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Directory for 8-bit depth previews (overrides config).
    #[arg(long)]
    preview_dir: Option<PathBuf>,

    /// Preview near limit in meters, rendered black (overrides config).
    #[arg(long)]
    depth_min: Option<f32>,

    /// Preview far limit in meters, rendered white (overrides config).
    #[arg(long)]
    depth_max: Option<f32>,

    /// Render near as white and far as black in the preview.
    #[arg(long)]
    invert: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ReceiverConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ReceiverConfig::load(&cli.config);
    if let Some(addr) = cli.listen {
        config.network.listen_address = addr;
    }
    if let Some(format) = cli.depth_format {
        config.depth.format = format;
    }
    if let Some(dir) = cli.dump_dir {
        config.depth.dump_dir = dir.to_string_lossy().into_owned();
    }
    if let Some(dir) = cli.preview_dir {
        config.depth.preview_dir = dir.to_string_lossy().into_owned();
    }
    if let Some(min) = cli.depth_min {
        config.depth.depth_min_m = min;
    }
    if let Some(max) = cli.depth_max {
        config.depth.depth_max_m = max;
    }
    if cli.invert {
        config.depth.invert = true;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("rgbd-receiver v{}", env!("CARGO_PKG_VERSION"));
    if let Some(dir) = config.dump_dir() {
        info!("dumping every {} depth frame(s) to {}", config.depth.dump_every, dir.display());
    }
    if let Some(dir) = config.preview_dir() {
        info!(
            "writing previews over {:.2}-{:.2} m{} to {}",
            config.depth.depth_min_m,
            config.depth.depth_max_m,
            if config.depth.invert { " (inverted)" } else { "" },
            dir.display()
        );
        if config.depth.depth_max_m <= config.depth.depth_min_m {
            warn!("preview far limit is not beyond the near limit; previews will be two-tone");
        }
    }

    let service = ReceiverService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    service.run().await?;

    Ok(())
}
