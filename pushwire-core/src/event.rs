//! Reserved protocol event names.
//!
//! Anything not listed here is an application event and is routed to
//! channel bindings by exact name.

use std::fmt;

// ── SystemEvent ──────────────────────────────────────────────────

/// Events the engine interprets itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemEvent {
    /// Handshake complete; `data.socket_id` carries the session id.
    ConnectionEstablished,
    /// Client → server channel subscription.
    Subscribe,
    /// Client → server channel unsubscription.
    Unsubscribe,
    /// Liveness probe (either direction).
    Ping,
    /// Reply to a liveness probe.
    Pong,
    /// Server-reported protocol error.
    Error,
}

impl SystemEvent {
    /// Every reserved event, in protocol order.
    pub const ALL: [SystemEvent; 6] = [
        SystemEvent::ConnectionEstablished,
        SystemEvent::Subscribe,
        SystemEvent::Unsubscribe,
        SystemEvent::Ping,
        SystemEvent::Pong,
        SystemEvent::Error,
    ];

    /// The wire name of this event.
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemEvent::ConnectionEstablished => "pusher:connection_established",
            SystemEvent::Subscribe => "pusher:subscribe",
            SystemEvent::Unsubscribe => "pusher:unsubscribe",
            SystemEvent::Ping => "pusher:ping",
            SystemEvent::Pong => "pusher:pong",
            SystemEvent::Error => "pusher:error",
        }
    }

    /// Look up a reserved event by its exact wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == name)
    }
}

impl fmt::Display for SystemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
