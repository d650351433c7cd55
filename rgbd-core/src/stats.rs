//! Throughput accounting for both ends of the stream.
//!
//! [`ThroughputWindow`] tracks bytes over a rolling window (sender side,
//! to log the outbound rate). [`StreamStats`] keeps cumulative per-type
//! counters since the first packet (receiver side).

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use crate::header::FrameType;
use crate::packet::FramePacket;

// ── ThroughputWindow ─────────────────────────────────────────────

/// Rolling-window byte rate.
pub struct ThroughputWindow {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    total_bytes: u64,
}

impl ThroughputWindow {
    /// A 1-second window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(64),
            window,
            total_bytes: 0,
        }
    }

    pub fn record(&mut self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    /// Record with an explicit timestamp (useful for testing).
    pub fn record_at(&mut self, when: Instant, bytes: u64) {
        self.samples.push_back((when, bytes));
        self.total_bytes += bytes;
        while let Some(&(ts, old)) = self.samples.front() {
            if when.duration_since(ts) <= self.window {
                break;
            }
            self.samples.pop_front();
            self.total_bytes = self.total_bytes.saturating_sub(old);
        }
    }

    /// Bytes per second across the samples currently in the window.
    pub fn bytes_per_sec(&self) -> u64 {
        let (Some((first, _)), Some((last, _))) = (self.samples.front(), self.samples.back())
        else {
            return 0;
        };
        let span = last.duration_since(*first).max(Duration::from_millis(1));
        (self.total_bytes as f64 / span.as_secs_f64()) as u64
    }

    pub fn kbps(&self) -> f64 {
        self.bytes_per_sec() as f64 * 8.0 / 1000.0
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl Default for ThroughputWindow {
    fn default() -> Self {
        Self::new()
    }
}

// ── StreamStats ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeCounters {
    pub frames: u64,
    pub bytes: u64,
}

/// Cumulative receive statistics since the first recorded packet.
#[derive(Debug, Clone)]
pub struct StreamStats {
    started: Option<Instant>,
    last: Option<Instant>,
    pub rgb: TypeCounters,
    pub depth: TypeCounters,
    pub metadata_packets: u64,
    pub key_frames: u64,
}

impl StreamStats {
    pub fn new() -> Self {
        Self {
            started: None,
            last: None,
            rgb: TypeCounters::default(),
            depth: TypeCounters::default(),
            metadata_packets: 0,
            key_frames: 0,
        }
    }

    pub fn record(&mut self, packet: &FramePacket) {
        self.record_at(Instant::now(), packet);
    }

    pub fn record_at(&mut self, when: Instant, packet: &FramePacket) {
        self.started.get_or_insert(when);
        self.last = Some(when);

        let bytes = packet.payload.len() as u64;
        match packet.frame_type {
            FrameType::Rgb => {
                self.rgb.frames += 1;
                self.rgb.bytes += bytes;
            }
            FrameType::Depth => {
                self.depth.frames += 1;
                self.depth.bytes += bytes;
            }
            FrameType::Metadata => self.metadata_packets += 1,
        }
        if packet.is_key_frame {
            self.key_frames += 1;
        }
    }

    /// Time between the first and the latest packet.
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.last) {
            (Some(start), Some(last)) => last.duration_since(start),
            _ => Duration::ZERO,
        }
    }

    pub fn fps(&self, frame_type: FrameType) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.counters(frame_type).frames as f64 / secs
    }

    pub fn kbps(&self, frame_type: FrameType) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.counters(frame_type).bytes as f64 * 8.0 / 1000.0 / secs
    }

    fn counters(&self, frame_type: FrameType) -> TypeCounters {
        match frame_type {
            FrameType::Rgb => self.rgb,
            FrameType::Depth => self.depth,
            FrameType::Metadata => TypeCounters {
                frames: self.metadata_packets,
                bytes: 0,
            },
        }
    }
}

impl Default for StreamStats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rgb_kbps = self.kbps(FrameType::Rgb);
        let depth_kbps = self.kbps(FrameType::Depth);
        write!(
            f,
            "RGB: {} frames ({:.1} fps, {:.0} kbps) | Depth: {} frames ({:.1} fps, {:.0} kbps) | Total: {:.0} kbps",
            self.rgb.frames,
            self.fps(FrameType::Rgb),
            rgb_kbps,
            self.depth.frames,
            self.fps(FrameType::Depth),
            depth_kbps,
            rgb_kbps + depth_kbps,
        )
    }
}

// ── Tests ────────────────────────────────────────────────────────
