//! Configuration for the listener.

use std::path::Path;
use std::time::Duration;

use pushwire_core::SessionConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Application credentials.
    pub app: AppConfig,
    /// Endpoint and heartbeat settings.
    pub session: SessionConfig,
    /// What to listen to.
    pub subscribe: SubscribeConfig,
    /// What to do when the connection drops.
    pub reconnect: ReconnectConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Application credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Public application key.
    pub key: String,
}

/// Subscriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribeConfig {
    /// Public channels to join.
    pub channels: Vec<String>,
    /// Events to log on every channel.
    pub events: Vec<String>,
}

/// Reconnection policy. The engine never reconnects by itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Dial again after an unexpected disconnect.
    pub enabled: bool,
    /// Pause before dialing again, in milliseconds.
    pub delay_ms: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter, e.g. `info` or `pushwire_core=debug`.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            session: SessionConfig::default(),
            subscribe: SubscribeConfig::default(),
            reconnect: ReconnectConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SubscribeConfig {
    fn default() -> Self {
        Self {
            channels: vec!["test-channel".into()],
            events: vec!["price-updated".into()],
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 5000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ListenConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect.delay_ms)
    }

    /// Session settings for a listener.
    ///
    /// Channels are registered before the first connect, so they must
    /// be replayed whenever the backend confirms a connection.
    pub fn to_session_config(&self) -> SessionConfig {
        self.session.clone().with_resubscribe_on_connect(true)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = ListenConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("activity_timeout_ms"));
        assert!(text.contains("test-channel"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = ListenConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ListenConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.session.host, "ws.pusherapp.com");
        assert_eq!(parsed.subscribe.events, vec!["price-updated"]);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let text = r#"
            [app]
            key = "80bbbe17a2e65338705a"

            [session]
            host = "127.0.0.1"
            port = 6001
        "#;
        let cfg: ListenConfig = toml::from_str(text).unwrap();
        assert_eq!(cfg.app.key, "80bbbe17a2e65338705a");
        assert_eq!(cfg.session.port, 6001);
        assert_eq!(cfg.session.pong_timeout_ms, 30_000);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.reconnect_delay(), Duration::from_secs(5));
    }

    #[test]
    fn session_config_forces_resubscribe() {
        let cfg = ListenConfig::default();
        assert!(!cfg.session.resubscribe_on_connect);
        assert!(cfg.to_session_config().resubscribe_on_connect);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = ListenConfig::load(Path::new("/nonexistent/pushwire-listen.toml"));
        assert!(cfg.app.key.is_empty());
    }
}
