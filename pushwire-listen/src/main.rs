//! pushwire-listen: entry point.
//!
//! ```text
//! pushwire-listen --key <app-key>                 Listen with defaults
//! pushwire-listen --channel a --event e           Override subscriptions
//! pushwire-listen --config <path>                 Load a custom config TOML
//! pushwire-listen --gen-config                    Write default config to stdout
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use pushwire_core::{Session, SessionListener};
use pushwire_listen::config::ListenConfig;
use pushwire_ws::WsTransport;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pushwire-listen", about = "Subscribe to Pusher channels and log events")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "pushwire-listen.toml")]
    config: PathBuf,

    /// Application key (overrides the config file).
    #[arg(short, long)]
    key: Option<String>,

    /// Channel to subscribe to; repeatable (overrides the config file).
    #[arg(long = "channel")]
    channels: Vec<String>,

    /// Event to log on every channel; repeatable (overrides the config file).
    #[arg(long = "event")]
    events: Vec<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Listener ─────────────────────────────────────────────────────

struct LogListener {
    dropped: Arc<Notify>,
}

impl SessionListener for LogListener {
    fn on_connect(&self, socket_id: &str) {
        info!(%socket_id, "connected");
    }

    fn on_message(&self, raw: &str) {
        debug!("{raw}");
    }

    fn on_disconnect(&self) {
        warn!("disconnected");
        self.dropped.notify_one();
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ListenConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config, then apply CLI overrides.
    let mut config = ListenConfig::load(&cli.config);
    if let Some(key) = cli.key {
        config.app.key = key;
    }
    if !cli.channels.is_empty() {
        config.subscribe.channels = cli.channels;
    }
    if !cli.events.is_empty() {
        config.subscribe.events = cli.events;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if config.app.key.is_empty() {
        return Err("no application key: pass --key or set [app] key".into());
    }

    info!("pushwire-listen v{}", env!("CARGO_PKG_VERSION"));
    info!("endpoint: {}", config.session.url(&config.app.key));

    let session = Session::with_config(
        config.app.key.clone(),
        WsTransport::shared(),
        config.to_session_config(),
    );
    let dropped = Arc::new(Notify::new());
    // Held for the life of `main`; the session only keeps a weak reference.
    let listener = Arc::new(LogListener {
        dropped: Arc::clone(&dropped),
    });
    session.set_listener(&listener);

    for name in &config.subscribe.channels {
        let channel = session.subscribe(name)?;
        for event in &config.subscribe.events {
            let (channel_name, event_name) = (name.clone(), event.clone());
            channel.bind(event, move |raw: &str| {
                info!(channel = %channel_name, event = %event_name, "{raw}");
            });
        }
        info!("listening on {channel}");
    }

    session.connect();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            res = &mut shutdown => {
                res?;
                break;
            }
            _ = dropped.notified() => {
                if !config.reconnect.enabled {
                    break;
                }
                let delay = config.reconnect_delay();
                info!("reconnecting in {delay:?}");
                tokio::select! {
                    res = &mut shutdown => {
                        res?;
                        break;
                    }
                    _ = tokio::time::sleep(delay) => session.connect(),
                }
            }
        }
    }

    info!("shutting down");
    session.disconnect();
    Ok(())
}
