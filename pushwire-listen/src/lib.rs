//! # pushwire-listen: command-line channel subscriber
//!
//! Connects to a Pusher-protocol backend over WebSocket, subscribes to
//! the configured channels, and logs every bound event as it arrives.
//! Runs until Ctrl-C.

pub mod config;
