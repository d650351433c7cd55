use tokio::sync::mpsc;

/// Human-readable connection event published by a
/// [`FrameStreamer`](super::FrameStreamer).
///
/// `connected` is the connection flag at the time the event was emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStatus {
    pub message: String,
    pub connected: bool,
}

impl StreamStatus {
    pub fn new(message: impl Into<String>, connected: bool) -> Self {
        Self {
            message: message.into(),
            connected,
        }
    }
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flag = if self.connected { "up" } else { "down" };
        write!(f, "[{flag}] {}", self.message)
    }
}

pub type StatusSender = mpsc::UnboundedSender<StreamStatus>;

/// Ordered stream of status events. Dropping it is allowed; the streamer
/// keeps working and discards further events.
pub type StatusReceiver = mpsc::UnboundedReceiver<StreamStatus>;
