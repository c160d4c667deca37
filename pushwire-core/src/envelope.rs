//! Wire envelope codec.
//!
//! # Wire format
//!
//! ```text
//! {"event": "<name>", "data": <any>?, "channel": "<name>"?}
//! ```
//!
//! `event` is required. `data` may be a nested document or a
//! JSON-encoded string (the backend sends the latter for its own
//! events); [`Envelope::data_object`] accepts both. `channel` is only
//! present on channel-scoped traffic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::PushwireError;
use crate::event::SystemEvent;

/// One message unit exchanged over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name, reserved or application-defined.
    pub event: String,

    /// Event payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Channel scope for channel events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl Envelope {
    /// An unscoped event.
    pub fn event(event: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            event: event.into(),
            data,
            channel: None,
        }
    }

    /// An event scoped to `channel`.
    pub fn channel_event(
        channel: impl Into<String>,
        event: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        Self {
            event: event.into(),
            data,
            channel: Some(channel.into()),
        }
    }

    /// `pusher:subscribe` for `channel`.
    ///
    /// `auth` is forwarded verbatim for private and presence channels;
    /// `user_id` adds the presence `channel_data` document.
    pub fn subscribe(channel: &str, auth: Option<&str>, user_id: Option<&str>) -> Self {
        let mut data = Map::new();
        data.insert("channel".into(), Value::from(channel));
        if let Some(auth) = auth {
            data.insert("auth".into(), Value::from(auth));
        }
        if let Some(user_id) = user_id {
            data.insert("channel_data".into(), json!({ "user_id": user_id }));
        }
        Self::event(SystemEvent::Subscribe.as_str(), Some(Value::Object(data)))
    }

    /// `pusher:unsubscribe` for `channel`.
    pub fn unsubscribe(channel: &str) -> Self {
        Self::event(
            SystemEvent::Unsubscribe.as_str(),
            Some(json!({ "channel": channel })),
        )
    }

    /// `pusher:ping` with no payload.
    pub fn ping() -> Self {
        Self::event(SystemEvent::Ping.as_str(), None)
    }

    /// `pusher:pong` with no payload.
    pub fn pong() -> Self {
        Self::event(SystemEvent::Pong.as_str(), None)
    }

    // ── Codec ────────────────────────────────────────────────────

    /// Parse inbound text.
    pub fn decode(text: &str) -> Result<Self, PushwireError> {
        serde_json::from_str(text).map_err(|e| PushwireError::MalformedEnvelope(e.to_string()))
    }

    /// Serialize for the transport.
    pub fn encode(&self) -> Result<String, PushwireError> {
        Ok(serde_json::to_string(self)?)
    }

    // ── Accessors ────────────────────────────────────────────────

    /// The reserved event this envelope carries, if any.
    pub fn system_event(&self) -> Option<SystemEvent> {
        SystemEvent::from_name(&self.event)
    }

    /// `data` as a field map, decoding a string-encoded document if needed.
    pub fn data_object(&self) -> Result<Map<String, Value>, PushwireError> {
        match &self.data {
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(Value::String(text)) => match serde_json::from_str(text) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(PushwireError::MalformedEnvelope(
                    "data string is not a document".into(),
                )),
                Err(e) => Err(PushwireError::MalformedEnvelope(e.to_string())),
            },
            Some(_) => Err(PushwireError::MalformedEnvelope(
                "data is not a document".into(),
            )),
            None => Err(PushwireError::MalformedEnvelope("missing data".into())),
        }
    }

    /// `data.socket_id` of a connection-established envelope.
    pub fn socket_id(&self) -> Result<String, PushwireError> {
        self.data_object()?
            .get("socket_id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| PushwireError::MalformedEnvelope("missing socket_id".into()))
    }
}
