//! Receiver service: accepts one sender at a time and consumes its stream.
//!
//! Depth decoding and image encoding run on the blocking pool; the session
//! task only does network and file I/O.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rgbd_core::{
    DepthBuffer, DepthCodec, DepthFormat, FramePacket, FrameReceiver, FrameType, SessionMetadata,
};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::ReceiverConfig;
use crate::preview::DepthPreview;

type DumpError = Box<dyn std::error::Error + Send + Sync>;

// ── DepthDump ────────────────────────────────────────────────────

/// What a dump writes for each due frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DumpKind {
    /// Lossless 16-bit PNG in millimeters.
    Millimeters,
    /// 8-bit gray over a fixed near/far window.
    Preview(DepthPreview),
}

impl DumpKind {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Millimeters => "depth",
            Self::Preview(_) => "preview",
        }
    }

    /// CPU-bound; run it on the blocking pool.
    fn encode(&self, depth: &DepthBuffer) -> Result<Vec<u8>, DumpError> {
        match self {
            Self::Millimeters => Ok(DepthCodec::compress(depth, DepthFormat::Png16)?
                .into_bytes()
                .to_vec()),
            Self::Preview(preview) => Ok(preview.encode_png(depth)?),
        }
    }
}

/// Writes every Nth decoded depth frame to a directory as PNG.
#[derive(Debug, Clone)]
pub struct DepthDump {
    dir: PathBuf,
    every: u32,
    kind: DumpKind,
}

impl DepthDump {
    pub fn new(dir: PathBuf, every: u32, kind: DumpKind) -> Self {
        Self {
            dir,
            every: every.max(1),
            kind,
        }
    }

    pub fn is_due(&self, frame_number: u32) -> bool {
        frame_number % self.every == 0
    }

    pub fn path_for(&self, session_id: &str, frame_number: u32) -> PathBuf {
        let short = session_id.get(..8).unwrap_or(session_id);
        self.dir
            .join(format!("{}_{short}_{frame_number:06}.png", self.kind.prefix()))
    }

    /// Write the frame if its number is due. Returns the written path.
    pub async fn write(
        &self,
        session_id: &str,
        frame_number: u32,
        depth: &Arc<DepthBuffer>,
    ) -> Result<Option<PathBuf>, DumpError> {
        if !self.is_due(frame_number) {
            return Ok(None);
        }
        let kind = self.kind;
        let depth = Arc::clone(depth);
        let png = tokio::task::spawn_blocking(move || kind.encode(&depth)).await??;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(session_id, frame_number);
        tokio::fs::write(&path, png).await?;
        Ok(Some(path))
    }
}

// ── ReceiverService ──────────────────────────────────────────────

pub struct ReceiverService {
    config: ReceiverConfig,
    dumps: Vec<DepthDump>,
    running: Arc<AtomicBool>,
}

impl ReceiverService {
    pub fn new(config: ReceiverConfig) -> Self {
        let every = config.depth.dump_every;
        let mut dumps = Vec::new();
        if let Some(dir) = config.dump_dir() {
            dumps.push(DepthDump::new(dir, every, DumpKind::Millimeters));
        }
        if let Some(dir) = config.preview_dir() {
            let preview = DepthPreview::from_config(&config.depth);
            dumps.push(DepthDump::new(dir, every, DumpKind::Preview(preview)));
        }
        Self {
            config,
            dumps,
            // Armed up front so a stop requested before `serve` is kept.
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bind the configured address and serve until stopped.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.config.listen_addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accept senders one at a time on an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error>> {
        info!("listening on {}", listener.local_addr()?);
        info!(
            "expecting {} depth{}",
            self.config.depth.format,
            if self.config.depth.format.preserves_scale() {
                ""
            } else {
                " (relative scale only)"
            }
        );

        while self.running.load(Ordering::SeqCst) {
            let accept = tokio::select! {
                result = listener.accept() => result,
                _ = Self::wait_for_stop(&self.running) => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            info!("sender connected from {peer}");
            self.handle_session(stream, peer).await;
        }

        self.running.store(false, Ordering::SeqCst);
        info!("receiver stopped");
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn handle_session(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not disable Nagle for {peer}: {e}");
        }
        let mut rx = FrameReceiver::new(stream);

        let interval = self.config.stats_interval();
        let period = interval.unwrap_or(Duration::from_secs(3600));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                next = rx.next_packet() => match next {
                    None => {
                        info!("{peer} closed the stream");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("stream error from {peer}: {e}");
                        break;
                    }
                    Some(Ok(packet)) => self.handle_packet(&rx, &packet).await,
                },
                _ = ticker.tick(), if interval.is_some() => info!("{}", rx.stats()),
                _ = Self::wait_for_stop(&self.running) => break,
            }
        }

        info!("session with {peer} ended | {}", rx.stats());
    }

    async fn handle_packet(&self, rx: &FrameReceiver<TcpStream>, packet: &FramePacket) {
        match packet.frame_type {
            FrameType::Metadata => match rx.metadata() {
                Some(meta) => log_metadata(meta),
                None => warn!("metadata packet without a readable session description"),
            },
            FrameType::Rgb => {
                if packet.is_key_frame {
                    debug!(
                        "keyframe #{}: {:.1} KB",
                        packet.frame_number,
                        packet.payload.len() as f64 / 1024.0
                    );
                }
            }
            FrameType::Depth => self.handle_depth(rx, packet).await,
        }
    }

    async fn handle_depth(&self, rx: &FrameReceiver<TcpStream>, packet: &FramePacket) {
        let encoded = match rx.encoded_depth(packet, self.config.depth.format) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("cannot decode depth frame #{}: {e}", packet.frame_number);
                return;
            }
        };
        let decoded = tokio::task::spawn_blocking(move || DepthCodec::decompress(&encoded)).await;
        let depth = match decoded {
            Ok(Ok(depth)) => Arc::new(depth),
            Ok(Err(e)) => {
                warn!("failed to decode depth frame #{}: {e}", packet.frame_number);
                return;
            }
            Err(e) => {
                error!("depth decode task failed: {e}");
                return;
            }
        };
        debug!(
            "depth frame #{}: {}x{}, {} valid, {:.1} KB",
            packet.frame_number,
            depth.width(),
            depth.height(),
            depth.valid_count(),
            packet.payload.len() as f64 / 1024.0
        );

        let Some(meta) = rx.metadata() else {
            return;
        };
        for dump in &self.dumps {
            match dump
                .write(&meta.session_id, packet.frame_number, &depth)
                .await
            {
                Ok(Some(path)) => debug!("wrote {}", path.display()),
                Ok(None) => {}
                Err(e) => warn!("could not dump depth frame #{}: {e}", packet.frame_number),
            }
        }
    }

    /// Async helper: resolves when `running` becomes false.
    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

fn log_metadata(meta: &SessionMetadata) {
    info!("session {}", meta.session_id);
    info!("  RGB:   {}x{} ({})", meta.rgb_width, meta.rgb_height, meta.rgb_encoding);
    info!("  Depth: {}x{}", meta.depth_width, meta.depth_height);
    info!("  FPS:   {}", meta.fps);
}

// ── Tests ────────────────────────────────────────────────────────
