//! # pushwire-core
//!
//! Client-side engine for the Pusher publish/subscribe protocol over a
//! single persistent duplex connection.
//!
//! This crate contains:
//! - **Session**: `Session`, connection state machine, channel registry
//!   and inbound demultiplexer
//! - **Channels**: `Channel` handles and `ChannelListener` bindings
//! - **Heartbeat**: `HeartbeatController`, ping on silence, disconnect
//!   on a missing pong
//! - **Envelope**: `Envelope` / `SystemEvent`, the JSON wire format
//! - **Transport**: `Transport` / `TransportHandler`, the capability a
//!   concrete socket implementation provides
//! - **Error**: `PushwireError`, typed, `thiserror`-based errors

pub mod channel;
pub mod config;
pub mod envelope;
pub mod error;
pub mod event;
pub mod heartbeat;
pub mod session;
pub mod state;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use channel::{Channel, ChannelListener};
pub use config::SessionConfig;
pub use envelope::Envelope;
pub use error::PushwireError;
pub use event::SystemEvent;
pub use heartbeat::{HeartbeatAction, HeartbeatController};
pub use session::{Session, SessionListener};
pub use state::ConnectionState;
pub use transport::{Transport, TransportHandler};
