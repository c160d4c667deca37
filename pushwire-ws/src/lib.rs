//! # pushwire-ws
//!
//! WebSocket implementation of the [`Transport`] capability, built on
//! `tokio-tungstenite`.
//!
//! Each `connect` spawns one link task that owns the socket. The task
//! multiplexes three sources until any of them ends the link:
//!
//! ```text
//!   outbound queue ──► socket sink        (Session::send, pings, …)
//!   socket stream  ──► handler.on_message (text frames only)
//!   cancel token   ──► close frame        (Transport::close)
//! ```
//!
//! `on_close` is reported exactly once per link, whether the dial
//! failed, the peer went away, or the link was closed locally.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use pushwire_core::{PushwireError, Transport, TransportHandler};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The live half of one connection attempt.
struct Link {
    tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    open: Arc<AtomicBool>,
}

/// A [`Transport`] over a single WebSocket connection.
#[derive(Default)]
pub struct WsTransport {
    link: Mutex<Option<Link>>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle, ready to pass to [`Session::new`](pushwire_core::Session::new).
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Transport for WsTransport {
    fn connect(&self, url: &str, handler: Arc<dyn TransportHandler>) -> Result<(), PushwireError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PushwireError::Transport(format!("no tokio runtime: {e}")))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let open = Arc::new(AtomicBool::new(false));

        let previous = self.link.lock().replace(Link {
            tx,
            cancel: cancel.clone(),
            open: Arc::clone(&open),
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        runtime.spawn(run_link(url.to_owned(), handler, rx, cancel, open));
        Ok(())
    }

    fn send(&self, text: &str) -> Result<(), PushwireError> {
        let link = self.link.lock();
        let link = link.as_ref().ok_or(PushwireError::TransportUnavailable)?;
        if !link.open.load(Ordering::SeqCst) {
            return Err(PushwireError::TransportUnavailable);
        }
        link.tx
            .send(text.to_owned())
            .map_err(|_| PushwireError::Transport("link task has stopped".into()))
    }

    fn close(&self) {
        if let Some(link) = self.link.lock().take() {
            link.open.store(false, Ordering::SeqCst);
            link.cancel.cancel();
        }
    }

    fn is_connected(&self) -> bool {
        self.link
            .lock()
            .as_ref()
            .is_some_and(|link| link.open.load(Ordering::SeqCst))
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.cancel.cancel();
        }
    }
}

/// Owns one socket from dial to close.
async fn run_link(
    url: String,
    handler: Arc<dyn TransportHandler>,
    mut rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
    open: Arc<AtomicBool>,
) {
    let dialed = tokio::select! {
        _ = cancel.cancelled() => None,
        result = connect_async(url.as_str()) => match result {
            Ok((stream, _)) => Some(stream),
            Err(e) => {
                warn!(%url, "websocket dial failed: {e}");
                None
            }
        },
    };
    let Some(stream) = dialed else {
        handler.on_close();
        return;
    };

    open.store(true, Ordering::SeqCst);
    debug!(%url, "websocket open");
    handler.on_open();

    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            Some(text) = rx.recv() => {
                if let Err(e) = sink.send(Message::text(text)).await {
                    warn!("websocket write error: {e}");
                    break;
                }
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => handler.on_message(text.as_str()),
                Some(Ok(Message::Close(_))) | None => break,
                // Control frames are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("websocket read error: {e}");
                    break;
                }
            },
        }
    }

    open.store(false, Ordering::SeqCst);
    debug!(%url, "websocket closed");
    handler.on_close();
}
