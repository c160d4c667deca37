//! Transport capability consumed by the session.
//!
//! The engine knows nothing about sockets, framing or TLS. Anything
//! that can carry text frames both ways and report open/close can back
//! a [`Session`](crate::Session).

use std::sync::Arc;

use crate::error::PushwireError;

/// Inbound notifications installed by the session on [`Transport::connect`].
///
/// Called from whatever task or thread the transport reads on.
pub trait TransportHandler: Send + Sync {
    /// The underlying link is open.
    fn on_open(&self);

    /// One inbound text frame.
    fn on_message(&self, text: &str);

    /// The link is gone, for any reason.
    fn on_close(&self);
}

/// A single persistent duplex text connection.
///
/// # Contract
///
/// - `send` enqueues without blocking and must not invoke the handler
///   synchronously; the session calls it while holding its lock.
/// - `close` is idempotent.
pub trait Transport: Send + Sync {
    /// Start dialing `url`. Completion is reported through `handler`.
    fn connect(&self, url: &str, handler: Arc<dyn TransportHandler>) -> Result<(), PushwireError>;

    /// Queue one text frame.
    fn send(&self, text: &str) -> Result<(), PushwireError>;

    /// Tear the link down.
    fn close(&self);

    /// Whether the link is currently open.
    fn is_connected(&self) -> bool;
}
