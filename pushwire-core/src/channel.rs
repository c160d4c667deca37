//! Channel registry and event bindings.
//!
//! The session owns one [`ChannelRegistry`]. Applications only ever
//! hold [`Channel`] handles, which name a registry entry by id and go
//! inert once that entry is removed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::session::Inner;

// ── ChannelListener ──────────────────────────────────────────────

/// Receives the raw text of every envelope bound to one channel event.
pub trait ChannelListener: Send + Sync {
    fn on_message(&self, raw: &str);
}

impl<F> ChannelListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_message(&self, raw: &str) {
        self(raw)
    }
}

// ── ChannelEntry ─────────────────────────────────────────────────

/// Registry-side state of one subscription.
pub(crate) struct ChannelEntry {
    pub(crate) id: u64,
    pub(crate) auth: Option<String>,
    pub(crate) user_id: Option<String>,
    bindings: HashMap<String, Arc<dyn ChannelListener>>,
}

impl ChannelEntry {
    /// Bind `event`, replacing any previous listener.
    pub(crate) fn bind(&mut self, event: &str, listener: Arc<dyn ChannelListener>) -> bool {
        self.bindings.insert(event.to_owned(), listener).is_some()
    }

    pub(crate) fn unbind(&mut self, event: &str) -> bool {
        self.bindings.remove(event).is_some()
    }

    pub(crate) fn listener(&self, event: &str) -> Option<Arc<dyn ChannelListener>> {
        self.bindings.get(event).cloned()
    }
}

// ── ChannelRegistry ──────────────────────────────────────────────

/// Channel name → subscription state. Names are unique.
#[derive(Default)]
pub(crate) struct ChannelRegistry {
    entries: HashMap<String, ChannelEntry>,
    next_id: u64,
}

impl ChannelRegistry {
    /// Insert `name`, or refresh the credentials of an existing entry.
    ///
    /// Existing bindings survive a repeated subscribe. Returns the
    /// entry id.
    pub(crate) fn upsert(&mut self, name: &str, auth: Option<&str>, user_id: Option<&str>) -> u64 {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.auth = auth.map(str::to_owned);
            entry.user_id = user_id.map(str::to_owned);
            return entry.id;
        }
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert(
            name.to_owned(),
            ChannelEntry {
                id,
                auth: auth.map(str::to_owned),
                user_id: user_id.map(str::to_owned),
                bindings: HashMap::new(),
            },
        );
        id
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<ChannelEntry> {
        self.entries.remove(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&ChannelEntry> {
        self.entries.get(name)
    }

    /// The entry for `name`, only if it is still entry `id`.
    pub(crate) fn get_mut(&mut self, name: &str, id: u64) -> Option<&mut ChannelEntry> {
        self.entries.get_mut(name).filter(|e| e.id == id)
    }

    /// Exact-match lookup of the listener bound to `event` on `channel`.
    pub(crate) fn listener(&self, channel: &str, event: &str) -> Option<Arc<dyn ChannelListener>> {
        self.entries.get(channel)?.listener(event)
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &ChannelEntry)> {
        self.entries.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

// ── Channel ──────────────────────────────────────────────────────

/// Application handle to one subscription.
///
/// Cheap to clone. Once the channel is unsubscribed (or the session is
/// dropped) every operation on the handle is a no-op, even if a channel
/// with the same name is subscribed again later.
#[derive(Clone)]
pub struct Channel {
    name: Arc<str>,
    id: u64,
    session: Weak<Inner>,
}

impl Channel {
    pub(crate) fn new(name: &str, id: u64, session: Weak<Inner>) -> Self {
        Self {
            name: Arc::from(name),
            id,
            session,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this handle's subscription is still in the registry.
    pub fn is_subscribed(&self) -> bool {
        self.session
            .upgrade()
            .is_some_and(|inner| inner.has_channel_entry(&self.name, self.id))
    }

    /// Route `event` on this channel to `listener`.
    ///
    /// Rebinding an event silently replaces the previous listener.
    pub fn bind(&self, event: &str, listener: impl ChannelListener + 'static) {
        if let Some(inner) = self.session.upgrade() {
            inner.bind(&self.name, self.id, event, Arc::new(listener));
        }
    }

    /// Drop the listener for `event`, if any.
    pub fn unbind(&self, event: &str) {
        if let Some(inner) = self.session.upgrade() {
            inner.unbind(&self.name, self.id, event);
        }
    }

    /// Send a channel-scoped event. Best effort: skipped when offline.
    pub fn send(&self, event: &str, data: Option<Value>) {
        if let Some(inner) = self.session.upgrade() {
            inner.send_on_channel(&self.name, self.id, event, data);
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────
