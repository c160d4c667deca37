//! Session connection state machine.
//!
//! Models the lifecycle of one logical session with validated
//! transitions that return `Result` instead of panicking.

use tokio::time::Instant;

use crate::error::PushwireError;

// ── ConnectionState ──────────────────────────────────────────────

/// The current state of a session.
///
/// ```text
///  Disconnected ──► Connecting ──► Connected
///       ▲                │              │
///       └────────────────┴──────────────┘
/// ```
///
/// `Connected` is entered on the backend's connection-established
/// event, not when the raw transport opens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No active connection. Initial and terminal state.
    #[default]
    Disconnected,

    /// Transport dialed; waiting for the backend handshake.
    Connecting,

    /// Handshake complete; a socket id has been assigned.
    Connected {
        /// When the session entered the `Connected` state.
        since: Instant,
    },
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
        }
    }
}

impl ConnectionState {
    /// Returns `true` once the backend handshake has completed.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Returns `true` when there is no connection at all.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// How long the session has been `Connected`.
    ///
    /// Returns `None` for any other state.
    pub fn connected_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), PushwireError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(PushwireError::ProtocolViolation(
                "cannot connect: not in Disconnected state",
            )),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn establish(&mut self) -> Result<(), PushwireError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(PushwireError::ProtocolViolation(
                "cannot establish: not in Connecting state",
            )),
        }
    }

    /// Force-reset to `Disconnected` regardless of current state.
    ///
    /// Returns the state that was left.
    pub fn force_disconnect(&mut self) -> ConnectionState {
        std::mem::take(self)
    }
}

// ── Tests ────────────────────────────────────────────────────────
