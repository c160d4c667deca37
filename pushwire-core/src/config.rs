//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Endpoint, client identity and heartbeat tuning for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// URI scheme: `ws` or `wss`.
    pub scheme: String,
    /// Backend host name.
    pub host: String,
    /// Backend port.
    pub port: u16,
    /// Protocol revision announced to the backend.
    pub protocol: u32,
    /// Client identifier announced to the backend.
    pub client: String,
    /// Client version announced to the backend.
    pub version: String,
    /// Quiet period after which a ping is sent, in milliseconds.
    pub activity_timeout_ms: u64,
    /// How long to wait for a pong before giving up, in milliseconds.
    pub pong_timeout_ms: u64,
    /// Re-send a subscribe for every registered channel whenever the
    /// backend confirms a (re)connection.
    pub resubscribe_on_connect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scheme: "ws".into(),
            host: "ws.pusherapp.com".into(),
            port: 80,
            protocol: 7,
            client: "js".into(),
            version: "1.8.3".into(),
            activity_timeout_ms: 120_000,
            pong_timeout_ms: 30_000,
            resubscribe_on_connect: false,
        }
    }
}

impl SessionConfig {
    /// Connection URI for `api_key`.
    pub fn url(&self, api_key: &str) -> String {
        format!(
            "{}://{}:{}/app/{}?protocol={}&client={}&version={}",
            self.scheme, self.host, self.port, api_key, self.protocol, self.client, self.version
        )
    }

    pub fn activity_timeout(&self) -> Duration {
        Duration::from_millis(self.activity_timeout_ms)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    /// Point the session at a different endpoint.
    pub fn with_endpoint(mut self, scheme: &str, host: &str, port: u16) -> Self {
        self.scheme = scheme.into();
        self.host = host.into();
        self.port = port;
        self
    }

    /// Override both heartbeat timeouts.
    pub fn with_timeouts(mut self, activity: Duration, pong: Duration) -> Self {
        self.activity_timeout_ms = saturating_millis(activity);
        self.pong_timeout_ms = saturating_millis(pong);
        self
    }

    pub fn with_resubscribe_on_connect(mut self, enabled: bool) -> Self {
        self.resubscribe_on_connect = enabled;
        self
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
