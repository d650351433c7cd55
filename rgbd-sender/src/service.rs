//! Sender pipeline.
//!
//! Captures at `capture_fps`, forwards at most `send_fps` frames to the
//! streamer, and never has more than one frame in compression at a time.
//! The send decision is made here; the streamer only transports.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rgbd_core::{ConnectionState, DepthCodec, FrameStreamer, ThroughputWindow};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::{EncodingConfig, SenderConfig};
use crate::source::{CapturedFrame, SyntheticSource, encode_rgb};

const REPORT_INTERVAL: Duration = Duration::from_secs(5);

// ── SendGate ─────────────────────────────────────────────────────

/// Frame-rate throttle: lets a frame through when at least one send
/// interval has passed since the previous one.
#[derive(Debug, Clone)]
pub struct SendGate {
    interval: Duration,
    last: Option<Instant>,
}

impl SendGate {
    pub fn new(send_fps: u32) -> Self {
        // 5% slack so capture jitter does not halve the rate.
        let interval = Duration::from_secs_f64(0.95 / send_fps.max(1) as f64);
        Self {
            interval,
            last: None,
        }
    }

    pub fn should_send(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

// ── Compression ──────────────────────────────────────────────────

/// Wire-ready payloads of one frame.
#[derive(Debug)]
pub struct CompressedFrame {
    pub timestamp: f64,
    pub rgb: Vec<u8>,
    pub depth: Vec<u8>,
}

impl CompressedFrame {
    pub fn len(&self) -> usize {
        self.rgb.len() + self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rgb.is_empty() && self.depth.is_empty()
    }
}

/// JPEG the color image and run the depth codec. CPU-bound; call it from a
/// blocking worker.
pub fn compress_frame(
    frame: &CapturedFrame,
    encoding: &EncodingConfig,
) -> Result<CompressedFrame, Box<dyn std::error::Error + Send + Sync>> {
    let rgb = encode_rgb(frame, encoding.rgb_quality)?;
    let depth = DepthCodec::compress(&frame.depth, encoding.depth_format)?;
    Ok(CompressedFrame {
        timestamp: frame.timestamp,
        rgb,
        depth: depth.into_bytes().to_vec(),
    })
}

// ── SenderService ────────────────────────────────────────────────

/// Owns the capture loop and the streamer for one run.
pub struct SenderService {
    config: SenderConfig,
    running: Arc<AtomicBool>,
}

impl SenderService {
    pub fn new(config: SenderConfig) -> Self {
        Self {
            config,
            // Armed up front so a stop requested before `run` is kept.
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

    /// Connect once and stream until stopped or until the connection
    /// fails or is closed.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let endpoint = match self.config.endpoint() {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };
        if !self.is_running() {
            info!("stop requested before start");
            return Ok(());
        }

        let (streamer, mut status) = FrameStreamer::new();
        let streamer = Arc::new(streamer);
        let mut state = streamer.state();
        streamer.connect(
            endpoint.host(),
            endpoint.port(),
            self.config.session_metadata(),
        );

        let capture_fps = self.config.capture_fps();
        let mut source = SyntheticSource::new(
            (self.config.capture.rgb_width, self.config.capture.rgb_height),
            (
                self.config.capture.depth_width,
                self.config.capture.depth_height,
            ),
            capture_fps,
        );
        let mut capture = tokio::time::interval(Duration::from_secs_f64(1.0 / capture_fps as f64));
        capture.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut report = tokio::time::interval(REPORT_INTERVAL);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut gate = SendGate::new(self.config.send_fps());
        let busy = Arc::new(AtomicBool::new(false));
        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel::<usize>();
        let mut throughput = ThroughputWindow::with_window(REPORT_INTERVAL);

        let mut captured: u64 = 0;
        let mut sent: u64 = 0;
        let mut skipped_busy: u64 = 0;
        let mut report_start = Instant::now();

        info!(
            "capturing at {capture_fps} fps, sending up to {} fps as {}",
            self.config.send_fps(),
            self.config.encoding.depth_format
        );

        loop {
            tokio::select! {
                _ = capture.tick() => {
                    let frame = match source.next_frame() {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("capture failed: {e}");
                            continue;
                        }
                    };
                    captured += 1;

                    if !streamer.is_connected() || !gate.should_send(Instant::now()) {
                        continue;
                    }
                    if busy.swap(true, Ordering::SeqCst) {
                        skipped_busy += 1;
                        debug!("previous frame still processing; skipping");
                        continue;
                    }
                    self.spawn_pipeline(frame, &streamer, &busy, &sent_tx);
                }
                Some(bytes) = sent_rx.recv() => {
                    sent += 1;
                    throughput.record(bytes as u64);
                }
                Some(event) = status.recv() => {
                    info!(connected = event.connected, "{}", event.message);
                }
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = state.borrow_and_update().clone();
                    match current {
                        ConnectionState::Failed => {
                            error!("connection to {endpoint} failed; stopping");
                            break;
                        }
                        ConnectionState::Cancelled => break,
                        other => debug!("streamer state: {other}"),
                    }
                }
                _ = report.tick() => {
                    let secs = report_start.elapsed().as_secs_f64().max(f64::EPSILON);
                    info!(
                        "capture {:.1} fps | sent {sent} frames ({:.0} kbps) | busy skips {skipped_busy}",
                        captured as f64 / secs,
                        throughput.kbps(),
                    );
                    captured = 0;
                    report_start = Instant::now();
                }
                _ = Self::wait_for_stop(&self.running) => break,
            }
        }

        streamer.disconnect();
        // Let the worker publish its last events.
        tokio::time::sleep(Duration::from_millis(50)).await;
        while let Ok(event) = status.try_recv() {
            info!(connected = event.connected, "{}", event.message);
        }

        self.running.store(false, Ordering::SeqCst);
        info!("sender stopped after {sent} frames");
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Compress on a blocking worker, then hand both payloads to the
    /// streamer. Clears `busy` when done, whatever the outcome.
    fn spawn_pipeline(
        &self,
        frame: CapturedFrame,
        streamer: &Arc<FrameStreamer>,
        busy: &Arc<AtomicBool>,
        sent: &mpsc::UnboundedSender<usize>,
    ) {
        let encoding = self.config.encoding.clone();
        let streamer = Arc::clone(streamer);
        let busy = Arc::clone(busy);
        let sent = sent.clone();

        tokio::spawn(async move {
            let result =
                tokio::task::spawn_blocking(move || compress_frame(&frame, &encoding)).await;
            match result {
                Ok(Ok(compressed)) => {
                    let _ = sent.send(compressed.len());
                    streamer.send_rgb(compressed.timestamp, compressed.rgb);
                    streamer.send_depth(compressed.timestamp, compressed.depth);
                }
                Ok(Err(e)) => warn!("dropping frame: {e}"),
                Err(e) => error!("compression task failed: {e}"),
            }
            busy.store(false, Ordering::SeqCst);
        });
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

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rgbd_core::{DepthFormat, EncodedDepth};

    #[test]
    fn service_creates_with_defaults() {
        let svc = SenderService::new(SenderConfig::default());
        assert!(svc.is_running());
    }

    #[test]
    fn stop_handle_works() {
        let svc = SenderService::new(SenderConfig::default());
        let handle = svc.stop_handle();
        handle.store(false, Ordering::SeqCst);
        assert!(!svc.is_running());
    }

    #[tokio::test]
    async fn stop_before_run_is_honoured() {
        let svc = SenderService::new(SenderConfig::default());
        svc.stop_handle().store(false, Ordering::SeqCst);
        let result = tokio::time::timeout(Duration::from_secs(1), svc.run()).await;
        assert!(result.expect("run ignored the earlier stop").is_ok());
        assert!(!svc.is_running());
    }

    #[test]
    fn gate_halves_a_30fps_capture() {
        let mut gate = SendGate::new(15);
        let t0 = Instant::now();
        let frame = Duration::from_secs_f64(1.0 / 30.0);
        let passed = (0..30)
            .filter(|&i| gate.should_send(t0 + frame * i))
            .count();
        assert_eq!(passed, 15);
    }

    #[test]
    fn gate_lets_first_frame_through() {
        let mut gate = SendGate::new(1);
        let now = Instant::now();
        assert!(gate.should_send(now));
        assert!(!gate.should_send(now + Duration::from_millis(500)));
        assert!(gate.should_send(now + Duration::from_secs(1)));
    }

    #[test]
    fn compressed_depth_decodes_with_source_dims() {
        let mut source = SyntheticSource::new((16, 8), (16, 16), 30);
        let frame = source.next_frame().unwrap();
        let encoding = EncodingConfig {
            depth_format: DepthFormat::Raw16,
            rgb_quality: 60,
        };
        let compressed = compress_frame(&frame, &encoding).unwrap();
        assert_eq!(compressed.depth.len(), 16 * 16 * 2);
        assert!(!compressed.is_empty());

        let decoded = DepthCodec::decompress(&EncodedDepth::new(
            DepthFormat::Raw16,
            16,
            16,
            compressed.depth,
        ))
        .unwrap();
        assert_eq!(decoded.get(0, 0), Some(0.0));
    }

    #[tokio::test]
    async fn run_rejects_invalid_port() {
        let mut config = SenderConfig::default();
        config.network.port = 0;
        let svc = SenderService::new(config);
        assert!(svc.run().await.is_err());
        assert!(!svc.is_running());
    }
}
