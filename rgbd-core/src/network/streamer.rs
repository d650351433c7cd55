//! Single-connection frame streamer.
//!
//! A background worker task owns the TCP socket and the lifecycle state.
//! [`FrameStreamer`] is a thin handle that pushes commands onto an
//! unbounded channel, so none of its methods block or wait for I/O.
//! Results come back as [`StreamStatus`] events and on the
//! [`ConnectionState`] watch channel.
//!
//! ```text
//!  FrameStreamer ──cmd──►┌────────────┐──queue──► writer task ──► socket (write half)
//!                        │   worker   │                │
//!  connect task ──evt───►│  (select!) │◄──evt──────────┘
//!                        │            │◄──evt── peer watcher (read half)
//!                        └────────────┘
//!                          │        │
//!                  StreamStatus   watch<ConnectionState>
//! ```
//!
//! The worker never awaits socket I/O. Each connection gets its own writer
//! task fed by a bounded queue, so a peer that stops reading cannot keep
//! the worker from handling `disconnect` or a new `connect`. Frames that
//! arrive while the queue is full are dropped before they are numbered.
//!
//! Connection attempts are numbered. Transport events carry the attempt
//! they belong to and are dropped if a newer attempt (or a disconnect)
//! has happened since.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures::SinkExt;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, trace, warn};

use super::endpoint::Endpoint;
use super::status::{StatusReceiver, StatusSender, StreamStatus};
use crate::codec::FrameCodec;
use crate::header::FrameType;
use crate::packet::FramePacket;
use crate::protocol::SessionMetadata;
use crate::state::ConnectionState;

// ── Handle ───────────────────────────────────────────────────────

/// Handle to a streaming session. Must be created inside a tokio runtime.
///
/// Dropping the handle stops the worker and closes any open connection
/// without emitting further status events.
#[derive(Debug)]
pub struct FrameStreamer {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl FrameStreamer {
    /// Spawn the worker. Status events arrive on the returned receiver in
    /// the order they were produced.
    pub fn new() -> (Self, StatusReceiver) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        let worker = Worker::new(status_tx, state_tx, event_tx);
        tokio::spawn(worker.run(cmd_rx, event_rx));

        (
            Self {
                commands: cmd_tx,
                state: state_rx,
            },
            status_rx,
        )
    }

    /// Tear down any current connection and start a new one. `metadata` is
    /// sent once, as the first packet, when the transport becomes ready.
    pub fn connect(&self, host: impl Into<String>, port: u16, metadata: SessionMetadata) {
        self.dispatch(Command::Connect {
            host: host.into(),
            port,
            metadata,
        });
    }

    /// Close the connection and emit `"Disconnected"`.
    pub fn disconnect(&self) {
        self.dispatch(Command::Disconnect { silent: false });
    }

    /// Close the connection without emitting a status event.
    pub fn disconnect_silent(&self) {
        self.dispatch(Command::Disconnect { silent: true });
    }

    /// Queue one frame with a caller-chosen number. Dropped unless the
    /// streamer is connected when the worker gets to it.
    pub fn send_frame(
        &self,
        frame_type: FrameType,
        timestamp: f64,
        frame_number: u32,
        payload: impl Into<Bytes>,
        is_key_frame: bool,
    ) {
        let packet = FramePacket::new(frame_type, timestamp, frame_number, payload, is_key_frame);
        self.dispatch(Command::Send(Outgoing::Numbered(packet)));
    }

    /// Queue a color frame numbered by the per-connection RGB counter.
    /// Color frames are always flagged as key frames.
    pub fn send_rgb(&self, timestamp: f64, payload: impl Into<Bytes>) {
        self.send_sequenced(FrameType::Rgb, timestamp, payload.into());
    }

    /// Queue a depth frame numbered by the per-connection DEPTH counter.
    pub fn send_depth(&self, timestamp: f64, payload: impl Into<Bytes>) {
        self.send_sequenced(FrameType::Depth, timestamp, payload.into());
    }

    /// Subscribe to lifecycle changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Snapshot of the lifecycle state as last published by the worker.
    pub fn current_state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    fn send_sequenced(&self, frame_type: FrameType, timestamp: f64, payload: Bytes) {
        self.dispatch(Command::Send(Outgoing::Sequenced {
            frame_type,
            timestamp,
            payload,
        }));
    }

    fn dispatch(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("streamer worker has stopped; command dropped");
        }
    }
}

// ── Messages ─────────────────────────────────────────────────────

#[derive(Debug)]
enum Command {
    Connect {
        host: String,
        port: u16,
        metadata: SessionMetadata,
    },
    Disconnect {
        silent: bool,
    },
    Send(Outgoing),
}

#[derive(Debug)]
enum Outgoing {
    Numbered(FramePacket),
    Sequenced {
        frame_type: FrameType,
        timestamp: f64,
        payload: Bytes,
    },
}

#[derive(Debug)]
enum TransportEvent {
    Ready { attempt: u64, stream: TcpStream },
    Lost { attempt: u64, reason: String },
}

// ── Frame numbering ──────────────────────────────────────────────

/// Per-connection frame counters. RGB and DEPTH count independently and
/// wrap at `u32::MAX`; METADATA is always frame 0.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameCounters {
    rgb: u32,
    depth: u32,
}

impl FrameCounters {
    /// Number for the next frame of `frame_type`, advancing the counter.
    pub(crate) fn next(&mut self, frame_type: FrameType) -> u32 {
        let slot = match frame_type {
            FrameType::Rgb => &mut self.rgb,
            FrameType::Depth => &mut self.depth,
            FrameType::Metadata => return 0,
        };
        let number = *slot;
        *slot = slot.wrapping_add(1);
        number
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ── Worker ───────────────────────────────────────────────────────

/// Packets waiting for the writer task of one connection.
const WRITE_QUEUE_DEPTH: usize = 32;

struct Link {
    queue: mpsc::Sender<FramePacket>,
    writer: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

impl Link {
    fn close(self) {
        self.writer.abort();
        self.watcher.abort();
    }
}

struct Worker {
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    status_tx: StatusSender,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    attempt: u64,
    endpoint: Option<Endpoint>,
    pending_metadata: Option<SessionMetadata>,
    connector: Option<JoinHandle<()>>,
    link: Option<Link>,
    counters: FrameCounters,
}

impl Worker {
    fn new(
        status_tx: StatusSender,
        state_tx: watch::Sender<ConnectionState>,
        events_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            state: ConnectionState::Idle,
            state_tx,
            status_tx,
            events_tx,
            attempt: 0,
            endpoint: None,
            pending_metadata: None,
            connector: None,
            link: None,
            counters: FrameCounters::default(),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }

        self.teardown();
        if self.state.is_active() {
            self.state.cancel();
            self.publish_state();
        }
        debug!("streamer worker stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect {
                host,
                port,
                metadata,
            } => self.connect(host, port, metadata),
            Command::Disconnect { silent } => self.disconnect(silent),
            Command::Send(outgoing) => self.send(outgoing),
        }
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Ready { attempt, stream } => {
                if attempt != self.attempt || self.state != ConnectionState::Connecting {
                    trace!(attempt, "discarding stale connection");
                    return;
                }
                self.on_ready(stream);
            }
            TransportEvent::Lost { attempt, reason } => {
                if attempt != self.attempt || !self.state.is_active() {
                    trace!(attempt, %reason, "ignoring event from a previous connection");
                    return;
                }
                self.fail(reason);
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────

    fn connect(&mut self, host: String, port: u16, metadata: SessionMetadata) {
        if self.state.is_active() {
            self.teardown();
            self.state.cancel();
        }
        self.attempt += 1;
        self.pending_metadata = Some(metadata);

        if let Err(e) = self.state.begin_connect() {
            warn!("connect rejected: {e}");
            return;
        }
        self.publish_state();
        let target = format_target(&host, port);
        info!("connecting to {target}");
        self.status(format!("Connecting to {target}"), false);

        let endpoint = match Endpoint::new(host, port) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.fail(e.to_string());
                return;
            }
        };
        self.endpoint = Some(endpoint.clone());

        let attempt = self.attempt;
        let events = self.events_tx.clone();
        self.connector = Some(tokio::spawn(async move {
            let event = match TcpStream::connect((endpoint.host(), endpoint.port())).await {
                Ok(stream) => TransportEvent::Ready { attempt, stream },
                Err(e) => TransportEvent::Lost {
                    attempt,
                    reason: e.to_string(),
                },
            };
            let _ = events.send(event);
        }));
    }

    fn disconnect(&mut self, silent: bool) {
        self.teardown();
        self.state.cancel();
        self.publish_state();
        info!("disconnected");
        if !silent {
            self.status("Disconnected", false);
        }
    }

    fn send(&mut self, outgoing: Outgoing) {
        if !self.state.accepts_frames() {
            trace!(state = %self.state, "dropping frame: not connected");
            return;
        }
        let Some(link) = self.link.as_ref() else {
            return;
        };
        // Reserve first so a dropped frame does not consume a number.
        let permit = match link.queue.try_reserve() {
            Ok(permit) => permit,
            Err(TrySendError::Full(())) => {
                debug!("write queue full; dropping frame");
                return;
            }
            Err(TrySendError::Closed(())) => return,
        };

        let packet = match outgoing {
            Outgoing::Numbered(packet) => packet,
            Outgoing::Sequenced {
                frame_type,
                timestamp,
                payload,
            } => {
                let number = self.counters.next(frame_type);
                FramePacket::new(
                    frame_type,
                    timestamp,
                    number,
                    payload,
                    frame_type.default_key_frame(),
                )
            }
        };
        permit.send(packet);
    }

    // ── Transport ────────────────────────────────────────────────

    fn on_ready(&mut self, stream: TcpStream) {
        self.connector = None;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not disable Nagle: {e}");
        }

        let (read_half, write_half) = stream.into_split();
        let (queue, pending) = mpsc::channel(WRITE_QUEUE_DEPTH);
        let writer = tokio::spawn(write_frames(
            FramedWrite::new(write_half, FrameCodec::new()),
            pending,
            self.attempt,
            self.events_tx.clone(),
        ));
        let watcher = tokio::spawn(watch_peer(
            read_half,
            self.attempt,
            self.events_tx.clone(),
        ));
        self.link = Some(Link {
            queue,
            writer,
            watcher,
        });
        self.counters.reset();

        if let Err(e) = self.state.mark_ready() {
            warn!("ready event in unexpected state: {e}");
            return;
        }
        self.publish_state();

        let target = self
            .endpoint
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        info!("connected to {target}");
        self.status(format!("Connected to {target}"), true);

        self.send_metadata();
    }

    fn send_metadata(&mut self) {
        let Some(metadata) = self.pending_metadata.take() else {
            return;
        };
        match metadata.to_payload() {
            Ok(payload) => {
                debug!(session = %metadata.session_id, "sending session metadata");
                self.write(FramePacket::metadata(wall_clock_seconds(), payload));
            }
            Err(e) => {
                warn!("failed to send metadata: {e}");
                self.status(format!("Failed to send metadata: {e}"), true);
            }
        }
    }

    /// Queue a packet that must not be dropped for lack of room. Only the
    /// metadata goes through here, onto a queue that is still empty.
    fn write(&mut self, packet: FramePacket) {
        let Some(link) = self.link.as_ref() else {
            return;
        };
        if let Err(e) = link.queue.try_send(packet) {
            warn!("could not queue {} packet", e.into_inner().frame_type);
        }
    }

    fn fail(&mut self, reason: String) {
        self.teardown();
        if self.state.fail().is_err() {
            return;
        }
        self.publish_state();
        warn!("connection failed: {reason}");
        self.status(format!("Connection failed: {reason}"), false);
    }

    /// Abort any pending connect and close the socket, dropping whatever
    /// is still queued or half-written. State is untouched.
    fn teardown(&mut self) {
        if let Some(connector) = self.connector.take() {
            connector.abort();
        }
        if let Some(link) = self.link.take() {
            link.close();
        }
        self.pending_metadata = None;
    }

    // ── Outputs ──────────────────────────────────────────────────

    fn publish_state(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    fn status(&self, message: impl Into<String>, connected: bool) {
        // The receiver may have been dropped; events are then discarded.
        let _ = self.status_tx.send(StreamStatus::new(message, connected));
    }
}

/// Write queued packets in order until the queue closes or a write fails.
async fn write_frames(
    mut writer: FramedWrite<OwnedWriteHalf, FrameCodec>,
    mut pending: mpsc::Receiver<FramePacket>,
    attempt: u64,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    while let Some(packet) = pending.recv().await {
        let frame_type = packet.frame_type;
        if let Err(e) = writer.send(packet).await {
            warn!("{frame_type} write failed: {e}");
            let _ = events.send(TransportEvent::Lost {
                attempt,
                reason: e.to_string(),
            });
            return;
        }
    }
}

/// Drain the read half until the peer closes it or it errors. The receiver
/// never talks back, so anything it sends is ignored.
async fn watch_peer(
    mut reader: OwnedReadHalf,
    attempt: u64,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut scratch = [0u8; 256];
    let reason = loop {
        match reader.read(&mut scratch).await {
            Ok(0) => break "connection closed by peer".to_string(),
            Ok(_) => continue,
            Err(e) => break e.to_string(),
        }
    };
    let _ = events.send(TransportEvent::Lost { attempt, reason });
}

fn format_target(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn wall_clock_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

// ── Tests ────────────────────────────────────────────────────────
