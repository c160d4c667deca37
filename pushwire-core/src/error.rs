//! Error types for the pushwire engine.
//!
//! Internal operations return `Result<T, PushwireError>`. The public
//! session surface swallows transport and codec failures (logging them)
//! so an application only observes them as missing callbacks or an
//! `on_disconnect` notification.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the pushwire engine.
#[derive(Debug, Error)]
pub enum PushwireError {
    // ── Transport Errors ─────────────────────────────────────────
    /// An operation needed an open connection and there was none.
    #[error("transport unavailable")]
    TransportUnavailable,

    /// The transport reported an I/O failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// No pong arrived within the pong timeout after a ping.
    #[error("dead connection: no pong within {0:?}")]
    DeadConnection(Duration),

    // ── Protocol Errors ──────────────────────────────────────────
    /// Inbound text did not decode into a usable envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// A state transition was attempted from the wrong state.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// Channel names must be non-empty.
    #[error("invalid channel name: must not be empty")]
    InvalidChannelName,

    // ── Serialization Errors ─────────────────────────────────────
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl From<String> for PushwireError {
    fn from(s: String) -> Self {
        PushwireError::Other(s)
    }
}

impl From<&str> for PushwireError {
    fn from(s: &str) -> Self {
        PushwireError::Other(s.to_string())
    }
}
