//! RGB-D sender: entry point.
//!
//! ```text
//! rgbd-sender                          Stream with the config file settings
//! rgbd-sender --host 10.0.0.2 -p 8888  Override the receiver address
//! rgbd-sender --remember ...           Also save host/port to the config
//! rgbd-sender --config <path>          Load a custom config TOML
//! rgbd-sender --gen-config             Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use rgbd_core::DepthFormat;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rgbd_sender::config::SenderConfig;
use rgbd_sender::service::SenderService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rgbd-sender", about = "Stream RGB-D frames to a receiver")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "rgbd-sender.toml")]
    config: PathBuf,

    /// Receiver host (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Receiver port (overrides config).
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// Depth encoding: png16, jpeg8 or raw16 (overrides config).
    #[arg(long)]
    depth_format: Option<DepthFormat>,

    /// Save the effective host/port back to the config file.
    #[arg(long)]
    remember: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&SenderConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let mut config = SenderConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.network.host = host;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(format) = cli.depth_format {
        config.encoding.depth_format = format;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if cli.remember {
        match config.save(&cli.config) {
            Ok(()) => info!("saved receiver address to {}", cli.config.display()),
            Err(e) => warn!("could not save {}: {e}", cli.config.display()),
        }
    }

    info!("rgbd-sender v{}", env!("CARGO_PKG_VERSION"));
    info!("receiver: {}:{}", config.network.host, config.network.port);
    info!("depth format: {}", config.encoding.depth_format);

    let service = SenderService::new(config);
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
