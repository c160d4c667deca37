//! The session: connection state machine, channel registry and inbound
//! demultiplexer.
//!
//! # Locking
//!
//! All mutable state lives in one `parking_lot::Mutex`. Transport
//! callbacks and application calls both go through it, and outbound
//! frames are handed to the transport while it is held so every send of
//! one session leaves in FIFO order. Application callbacks always run
//! after the lock is released, so a listener may call back into the
//! session (e.g. subscribe from `on_connect`).
//!
//! # Epochs
//!
//! Every `connect` starts a new epoch and hands the transport a handler
//! tagged with it. Notifications carrying an older epoch are ignored, so
//! a late `on_close` from a previous link cannot tear down a new one.
//!
//! Dialing is serialized by a second lock. A `disconnect` that lands
//! while `Transport::connect` is still running is detected afterwards
//! and the fresh link is closed again.
//!
//! # Listener
//!
//! The session keeps only a `Weak` reference to its [`SessionListener`].
//! The application owns the listener, which may itself hold a `Session`
//! clone without keeping the session alive.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelListener, ChannelRegistry};
use crate::config::SessionConfig;
use crate::envelope::Envelope;
use crate::error::PushwireError;
use crate::event::SystemEvent;
use crate::heartbeat::{HeartbeatAction, HeartbeatController};
use crate::state::ConnectionState;
use crate::transport::{Transport, TransportHandler};

// ── SessionListener ──────────────────────────────────────────────

/// Session-level notifications. Every method defaults to a no-op.
pub trait SessionListener: Send + Sync {
    /// The backend confirmed the connection and assigned `socket_id`.
    fn on_connect(&self, _socket_id: &str) {}

    /// Raw text of every well-formed inbound envelope except the
    /// connection handshake.
    fn on_message(&self, _raw: &str) {}

    /// The session left the connected/connecting state.
    fn on_disconnect(&self) {}
}

// ── Session ──────────────────────────────────────────────────────

/// One logical connection to a pub/sub backend.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    api_key: String,
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    shared: Mutex<Shared>,
    dial: Mutex<()>,
    wake: Arc<Notify>,
}

struct Shared {
    state: ConnectionState,
    socket_id: Option<String>,
    channels: ChannelRegistry,
    heartbeat: HeartbeatController,
    listener: Option<Weak<dyn SessionListener>>,
    epoch: u64,
    heartbeat_cancel: Option<CancellationToken>,
}

impl Shared {
    fn listener(&self) -> Option<Arc<dyn SessionListener>> {
        self.listener.as_ref().and_then(Weak::upgrade)
    }
}

/// What to hand the application once the lock is released.
enum Delivery {
    Established(String),
    Raw(Option<Arc<dyn ChannelListener>>),
}

impl Session {
    /// A session for `api_key` with the default configuration.
    pub fn new(api_key: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self::with_config(api_key, transport, SessionConfig::default())
    }

    pub fn with_config(
        api_key: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: SessionConfig,
    ) -> Self {
        let heartbeat = HeartbeatController::new(config.activity_timeout(), config.pong_timeout());
        Self {
            inner: Arc::new(Inner {
                api_key: api_key.into(),
                config,
                transport,
                shared: Mutex::new(Shared {
                    state: ConnectionState::default(),
                    socket_id: None,
                    channels: ChannelRegistry::default(),
                    heartbeat,
                    listener: None,
                    epoch: 0,
                    heartbeat_cancel: None,
                }),
                dial: Mutex::new(()),
                wake: Arc::new(Notify::new()),
            }),
        }
    }

    /// Install the application listener, replacing any previous one.
    ///
    /// Only a weak reference is kept: callbacks stop once the caller
    /// drops its last `Arc`.
    pub fn set_listener<L: SessionListener + 'static>(&self, listener: &Arc<L>) {
        let listener: Weak<dyn SessionListener> = Arc::<L>::downgrade(listener);
        self.inner.shared.lock().listener = Some(listener);
    }

    pub fn api_key(&self) -> &str {
        &self.inner.api_key
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.shared.lock().state.is_connected()
    }

    /// The id assigned by the backend, while connected.
    pub fn socket_id(&self) -> Option<String> {
        self.inner.shared.lock().socket_id.clone()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open the transport. No-op unless `Disconnected`.
    ///
    /// Must be called inside a Tokio runtime for the heartbeat to run.
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Tear the connection down from any state. Idempotent.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    // ── Channels ─────────────────────────────────────────────────

    /// Subscribe to a public channel.
    ///
    /// The channel is registered immediately; the subscribe message is
    /// only sent if the session is connected right now.
    pub fn subscribe(&self, channel: &str) -> Result<Channel, PushwireError> {
        self.subscribe_with(channel, None, None)
    }

    /// Subscribe to a private channel with a precomputed auth token.
    pub fn subscribe_private(&self, channel: &str, auth: &str) -> Result<Channel, PushwireError> {
        self.subscribe_with(channel, Some(auth), None)
    }

    /// Subscribe to a presence channel as `user_id`.
    pub fn subscribe_presence(
        &self,
        channel: &str,
        auth: &str,
        user_id: &str,
    ) -> Result<Channel, PushwireError> {
        self.subscribe_with(channel, Some(auth), Some(user_id))
    }

    fn subscribe_with(
        &self,
        name: &str,
        auth: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Channel, PushwireError> {
        if name.is_empty() {
            return Err(PushwireError::InvalidChannelName);
        }

        let mut shared = self.inner.shared.lock();
        let id = shared.channels.upsert(name, auth, user_id);
        if shared.state.is_connected() {
            debug!(channel = name, "subscribing");
            self.inner
                .send_best_effort(&Envelope::subscribe(name, auth, user_id));
        } else {
            debug!(channel = name, state = %shared.state, "registered; not connected");
        }

        Ok(Channel::new(name, id, Arc::downgrade(&self.inner)))
    }

    /// Drop a subscription. Unknown names are ignored.
    pub fn unsubscribe(&self, name: &str) {
        let mut shared = self.inner.shared.lock();
        if !shared.channels.contains(name) {
            return;
        }
        if shared.state.is_connected() {
            self.inner.send_best_effort(&Envelope::unsubscribe(name));
        }
        shared.channels.remove(name);
        debug!(channel = name, "unsubscribed");
    }

    /// Handle to a registered channel.
    pub fn channel(&self, name: &str) -> Option<Channel> {
        let shared = self.inner.shared.lock();
        shared
            .channels
            .get(name)
            .map(|entry| Channel::new(name, entry.id, Arc::downgrade(&self.inner)))
    }

    /// Names of every registered channel, in no particular order.
    pub fn channel_names(&self) -> Vec<String> {
        self.inner.shared.lock().channels.names()
    }

    // ── Messaging ────────────────────────────────────────────────

    /// Send an unscoped event. Best effort: skipped when offline.
    pub fn send(&self, event: &str, data: Option<Value>) {
        let _shared = self.inner.shared.lock();
        self.inner.send_best_effort(&Envelope::event(event, data));
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("Session")
            .field("api_key", &self.inner.api_key)
            .field("state", &shared.state)
            .field("socket_id", &shared.socket_id)
            .field("channels", &shared.channels.len())
            .finish()
    }
}

// ── Inner ────────────────────────────────────────────────────────

impl Inner {
    fn connect(self: &Arc<Self>) {
        let dial = self.dial.lock();
        let epoch = {
            let mut shared = self.shared.lock();
            if let Err(e) = shared.state.begin_connect() {
                debug!(state = %shared.state, "connect ignored: {e}");
                return;
            }
            shared.epoch += 1;
            shared.socket_id = None;
            shared.heartbeat.disarm();
            shared.heartbeat_cancel = self.spawn_heartbeat();
            shared.epoch
        };

        let url = self.config.url(&self.api_key);
        info!(%url, "connecting");
        let handler = Arc::new(Link {
            epoch,
            session: Arc::downgrade(self),
        });
        let dialed = self.transport.connect(&url, handler);

        // A disconnect may have run while the transport was dialing.
        let orphaned = dialed.is_ok() && {
            let shared = self.shared.lock();
            shared.epoch != epoch || shared.state.is_disconnected()
        };
        if orphaned {
            debug!("disconnected while dialing; closing new link");
            self.transport.close();
        }
        drop(dial);

        if let Err(e) = dialed {
            warn!("transport connect failed: {e}");
            self.handle_close(epoch);
        }
    }

    fn disconnect(&self) {
        let (previous, listener) = {
            let mut shared = self.shared.lock();
            let previous = Self::teardown(&mut shared);
            (previous, shared.listener())
        };

        self.transport.close();

        if !previous.is_disconnected() {
            info!("disconnected");
            if let Some(listener) = listener {
                listener.on_disconnect();
            }
        }
    }

    /// Reset to `Disconnected` and silence the heartbeat. Returns the
    /// state that was left.
    fn teardown(shared: &mut Shared) -> ConnectionState {
        shared.heartbeat.disarm();
        if let Some(cancel) = shared.heartbeat_cancel.take() {
            cancel.cancel();
        }
        shared.socket_id = None;
        shared.state.force_disconnect()
    }

    // ── Transport notifications ──────────────────────────────────

    fn handle_open(&self, epoch: u64) {
        {
            let mut shared = self.shared.lock();
            if shared.epoch != epoch || shared.state != ConnectionState::Connecting {
                return;
            }
            debug!("transport open; awaiting handshake");
            shared.heartbeat.arm(Instant::now());
        }
        self.wake.notify_one();
    }

    fn handle_message(&self, epoch: u64, text: &str) {
        let mut armed = false;
        let (listener, delivery) = {
            let mut shared = self.shared.lock();
            if shared.epoch != epoch || shared.state.is_disconnected() {
                return;
            }

            let now = Instant::now();
            shared.heartbeat.on_activity(now);

            let envelope = match Envelope::decode(text) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!("dropping inbound frame: {e}");
                    return;
                }
            };

            let delivery = match envelope.system_event() {
                Some(SystemEvent::ConnectionEstablished) => {
                    let socket_id = match envelope.socket_id() {
                        Ok(id) => id,
                        Err(e) => {
                            warn!("dropping handshake: {e}");
                            return;
                        }
                    };
                    if let Err(e) = shared.state.establish() {
                        warn!(state = %shared.state, "ignoring handshake: {e}");
                        return;
                    }
                    info!(%socket_id, "connected");
                    if !shared.heartbeat.is_armed() {
                        shared.heartbeat.arm(now);
                        armed = true;
                    }
                    shared.socket_id = Some(socket_id.clone());
                    if self.config.resubscribe_on_connect {
                        self.resubscribe_all(&shared.channels);
                    }
                    Delivery::Established(socket_id)
                }
                Some(SystemEvent::Ping) => {
                    debug!("ping received");
                    self.send_best_effort(&Envelope::pong());
                    Delivery::Raw(None)
                }
                Some(SystemEvent::Pong) => {
                    debug!("pong received");
                    shared.heartbeat.on_pong(now);
                    Delivery::Raw(None)
                }
                Some(SystemEvent::Error) => {
                    warn!(data = ?envelope.data, "backend reported an error");
                    Delivery::Raw(None)
                }
                _ => Delivery::Raw(
                    envelope
                        .channel
                        .as_deref()
                        .and_then(|channel| shared.channels.listener(channel, &envelope.event)),
                ),
            };

            (shared.listener(), delivery)
        };

        if armed {
            self.wake.notify_one();
        }

        match delivery {
            Delivery::Established(socket_id) => {
                if let Some(listener) = listener {
                    listener.on_connect(&socket_id);
                }
            }
            Delivery::Raw(bound) => {
                if let Some(listener) = listener {
                    listener.on_message(text);
                }
                if let Some(bound) = bound {
                    bound.on_message(text);
                }
            }
        }
    }

    fn handle_close(&self, epoch: u64) {
        let listener = {
            let mut shared = self.shared.lock();
            if shared.epoch != epoch {
                return;
            }
            if Self::teardown(&mut shared).is_disconnected() {
                return;
            }
            shared.listener()
        };

        info!("transport closed");
        if let Some(listener) = listener {
            listener.on_disconnect();
        }
    }

    // ── Heartbeat ────────────────────────────────────────────────

    fn spawn_heartbeat(self: &Arc<Self>) -> Option<CancellationToken> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime; heartbeat disabled");
            return None;
        };
        let cancel = CancellationToken::new();
        runtime.spawn(run_heartbeat(
            Arc::downgrade(self),
            Arc::clone(&self.wake),
            cancel.clone(),
        ));
        Some(cancel)
    }

    fn heartbeat_deadline(&self) -> Option<Instant> {
        self.shared.lock().heartbeat.deadline()
    }

    fn heartbeat_tick(&self) {
        let expired = {
            let mut shared = self.shared.lock();
            match shared.heartbeat.poll(Instant::now()) {
                Some(HeartbeatAction::SendPing) => {
                    debug!("line quiet; sending ping");
                    self.send_best_effort(&Envelope::ping());
                    false
                }
                Some(HeartbeatAction::Expired) => true,
                None => false,
            }
        };

        if expired {
            warn!(
                "{}; disconnecting",
                PushwireError::DeadConnection(self.config.pong_timeout())
            );
            self.disconnect();
        }
    }

    // ── Outbound ─────────────────────────────────────────────────

    /// Encode and hand one envelope to the transport.
    ///
    /// Callers hold the shared lock.
    fn send_envelope(&self, envelope: &Envelope) -> Result<(), PushwireError> {
        if !self.transport.is_connected() {
            return Err(PushwireError::TransportUnavailable);
        }
        let text = envelope.encode()?;
        self.transport.send(&text)
    }

    fn send_best_effort(&self, envelope: &Envelope) {
        if let Err(e) = self.send_envelope(envelope) {
            debug!(event = %envelope.event, "send skipped: {e}");
        }
    }

    fn resubscribe_all(&self, channels: &ChannelRegistry) {
        for (name, entry) in channels.iter() {
            debug!(channel = %name, "resubscribing");
            self.send_best_effort(&Envelope::subscribe(
                name,
                entry.auth.as_deref(),
                entry.user_id.as_deref(),
            ));
        }
    }

    // ── Channel handle support ───────────────────────────────────

    pub(crate) fn has_channel_entry(&self, name: &str, id: u64) -> bool {
        self.shared
            .lock()
            .channels
            .get(name)
            .is_some_and(|entry| entry.id == id)
    }

    pub(crate) fn bind(&self, name: &str, id: u64, event: &str, listener: Arc<dyn ChannelListener>) {
        let mut shared = self.shared.lock();
        match shared.channels.get_mut(name, id) {
            Some(entry) => {
                if entry.bind(event, listener) {
                    debug!(channel = name, event, "binding replaced");
                }
            }
            None => debug!(channel = name, event, "bind on stale channel ignored"),
        }
    }

    pub(crate) fn unbind(&self, name: &str, id: u64, event: &str) {
        let mut shared = self.shared.lock();
        if let Some(entry) = shared.channels.get_mut(name, id) {
            entry.unbind(event);
        }
    }

    pub(crate) fn send_on_channel(&self, name: &str, id: u64, event: &str, data: Option<Value>) {
        let mut shared = self.shared.lock();
        if shared.channels.get_mut(name, id).is_none() {
            debug!(channel = name, event, "send on stale channel ignored");
            return;
        }
        self.send_best_effort(&Envelope::channel_event(name, event, data));
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(cancel) = self.shared.get_mut().heartbeat_cancel.take() {
            cancel.cancel();
        }
    }
}

// ── Link ─────────────────────────────────────────────────────────

/// The handler given to the transport for one connection attempt.
struct Link {
    epoch: u64,
    session: Weak<Inner>,
}

impl TransportHandler for Link {
    fn on_open(&self) {
        if let Some(inner) = self.session.upgrade() {
            inner.handle_open(self.epoch);
        }
    }

    fn on_message(&self, text: &str) {
        if let Some(inner) = self.session.upgrade() {
            inner.handle_message(self.epoch, text);
        }
    }

    fn on_close(&self) {
        if let Some(inner) = self.session.upgrade() {
            inner.handle_close(self.epoch);
        }
    }
}

// ── Heartbeat task ───────────────────────────────────────────────

/// Sleeps until the controller's deadline, then ticks it. Ends when
/// cancelled or when the session is dropped.
async fn run_heartbeat(session: Weak<Inner>, wake: Arc<Notify>, cancel: CancellationToken) {
    loop {
        let Some(inner) = session.upgrade() else {
            return;
        };
        let deadline = inner.heartbeat_deadline();
        drop(inner);

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = wake.notified() => continue,
            _ = sleep_until(deadline) => {}
        }

        let Some(inner) = session.upgrade() else {
            return;
        };
        inner.heartbeat_tick();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
