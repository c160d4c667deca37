//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use pushwire_core::{
    PushwireError, Session, SessionConfig, SessionListener, Transport, TransportHandler,
};
use serde_json::Value;

// ── MockTransport ────────────────────────────────────────────────

type DialHook = Box<dyn FnOnce() + Send>;

/// Records every frame the session sends and lets the test play the
/// backend's side through the installed handler.
#[derive(Default)]
pub struct MockTransport {
    connected: AtomicBool,
    link_live: AtomicBool,
    refuse_connect: AtomicBool,
    dial_hook: Mutex<Option<DialHook>>,
    sent: Mutex<Vec<String>>,
    urls: Mutex<Vec<String>>,
    handler: Mutex<Option<Arc<dyn TransportHandler>>>,
    closes: AtomicUsize,
}

impl Transport for MockTransport {
    fn connect(&self, url: &str, handler: Arc<dyn TransportHandler>) -> Result<(), PushwireError> {
        let hook = self.dial_hook.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(PushwireError::Transport("connection refused".into()));
        }
        self.urls.lock().push(url.to_owned());
        *self.handler.lock() = Some(handler);
        self.link_live.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn send(&self, text: &str) -> Result<(), PushwireError> {
        self.sent.lock().push(text.to_owned());
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.link_live.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl MockTransport {
    pub fn refuse_connect(&self) {
        self.refuse_connect.store(true, Ordering::SeqCst);
    }

    /// Run `hook` inside the next `connect`, before the link exists.
    pub fn on_next_dial(&self, hook: impl FnOnce() + Send + 'static) {
        *self.dial_hook.lock() = Some(Box::new(hook));
    }

    /// A link was created by `connect` and not closed since.
    pub fn link_live(&self) -> bool {
        self.link_live.load(Ordering::SeqCst)
    }

    /// The handler from the most recent `connect`.
    pub fn handler(&self) -> Arc<dyn TransportHandler> {
        self.handler.lock().clone().expect("connect was not called")
    }

    /// Raw socket is up.
    pub fn open(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.handler().on_open();
    }

    /// Socket is up but the transport never reports `on_open`.
    pub fn open_silently(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Backend → client frame.
    pub fn deliver(&self, text: &str) {
        self.handler().on_message(text);
    }

    pub fn deliver_json(&self, value: Value) {
        self.deliver(&value.to_string());
    }

    /// The link dropped on its own.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.link_live.store(false, Ordering::SeqCst);
        self.handler().on_close();
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Every sent frame, parsed.
    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|text| serde_json::from_str(text).expect("session sent invalid json"))
            .collect()
    }

    /// Sent frames whose `event` is `name`.
    pub fn sent_events(&self, name: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|frame| frame["event"] == name)
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }
}

// ── Recorder ─────────────────────────────────────────────────────

/// Session listener that records every callback.
#[derive(Default)]
pub struct Recorder {
    connects: Mutex<Vec<String>>,
    messages: Mutex<Vec<String>>,
    disconnects: AtomicUsize,
}

impl SessionListener for Recorder {
    fn on_connect(&self, socket_id: &str) {
        self.connects.lock().push(socket_id.to_owned());
    }

    fn on_message(&self, raw: &str) {
        self.messages.lock().push(raw.to_owned());
    }

    fn on_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

impl Recorder {
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

// ── Counter ──────────────────────────────────────────────────────

/// A channel listener that counts invocations.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn listener(&self) -> impl Fn(&str) + Send + Sync + 'static {
        let hits = Arc::clone(&self.0);
        move |_raw: &str| {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn hits(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Helpers ──────────────────────────────────────────────────────

pub const API_KEY: &str = "80bbbe17a2e65338705a";

pub fn handshake(socket_id: &str) -> String {
    serde_json::json!({
        "event": "pusher:connection_established",
        "data": { "socket_id": socket_id },
    })
    .to_string()
}

/// A session wired to a mock transport and a recorder, not yet connected.
pub fn session_with(config: SessionConfig) -> (Session, Arc<MockTransport>, Arc<Recorder>) {
    let transport = Arc::new(MockTransport::default());
    let recorder = Arc::new(Recorder::default());
    let session = Session::with_config(API_KEY, transport.clone(), config);
    session.set_listener(&recorder);
    (session, transport, recorder)
}

/// A session that has completed the handshake as `abc123`.
pub fn connected_session() -> (Session, Arc<MockTransport>, Arc<Recorder>) {
    let (session, transport, recorder) = session_with(SessionConfig::default());
    session.connect();
    transport.open();
    transport.deliver(&handshake("abc123"));
    assert!(session.is_connected());
    (session, transport, recorder)
}
