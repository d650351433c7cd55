//! Lifecycle state machine of a [`FrameStreamer`](crate::FrameStreamer)
//! connection.
//!
//! Transitions are validated and return `Result` instead of panicking.

use std::time::Instant;

use crate::error::StreamError;

// ── ConnectionState ──────────────────────────────────────────────

/// ```text
///  Idle ──► Connecting ──► Connected
///   │           │              │
///   │           ▼              ▼
///   │         Failed ◄─────────┘
///   │
///   └─ any state ──disconnect──► Cancelled
/// ```
///
/// `Failed` and `Cancelled` are resting states; a new `connect` starts over
/// from either of them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Nothing attempted yet.
    #[default]
    Idle,

    /// Resolution / TCP connect in progress. No timeout applies.
    Connecting,

    /// Transport ready; frames are written.
    Connected {
        /// When the connection became ready.
        since: Instant,
    },

    /// The transport reported an error. No automatic reconnect.
    Failed,

    /// Torn down on request.
    Cancelled,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Only a connected streamer puts frames on the wire.
    pub fn accepts_frames(&self) -> bool {
        self.is_connected()
    }

    /// `true` while a connection is being attempted or is up.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected { .. })
    }

    /// How long the connection has been up. `None` for any other state.
    pub fn connected_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Idle`, `Failed`, `Cancelled`. An active connection must
    /// be cancelled first.
    pub fn begin_connect(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Idle | Self::Failed | Self::Cancelled => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(StreamError::ProtocolViolation(
                "cannot connect: a connection is already active",
            )),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn mark_ready(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(StreamError::ProtocolViolation(
                "cannot mark ready: not in Connecting state",
            )),
        }
    }

    /// Transition to `Failed`.
    ///
    /// Valid from: `Connecting`, `Connected`.
    pub fn fail(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Connecting | Self::Connected { .. } => {
                *self = Self::Failed;
                Ok(())
            }
            _ => Err(StreamError::ProtocolViolation(
                "cannot fail: no connection is active",
            )),
        }
    }

    /// Force `Cancelled` regardless of the current state.
    pub fn cancel(&mut self) {
        *self = Self::Cancelled;
    }
}

// ── Tests ────────────────────────────────────────────────────────
