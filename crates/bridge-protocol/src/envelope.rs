//! # Message Envelope
//!
//! The canonical wrapper around every bus transmission.
//!
//! On the wire the envelope is a flat JSON object whose `type` field selects
//! the shape of `payload`. In memory the pair is held as the typed
//! [`Payload`] sum type, so a `Message` can never carry a payload that
//! disagrees with its kind.

use crate::errors::ProtocolError;
use crate::kinds::MessageType;
use crate::payloads::{JsonMap, Payload};
use crate::roles::SourceRole;
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Protocol version stamped on every envelope unless overridden.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Metadata key a sender sets to `true` to ask the hub for an `ack`.
pub const REQUIRES_ACK_KEY: &str = "requiresAck";

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// A single unit of transmission on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Unique per message. Used for dedup, logging and as the command id of
    /// `command_request`s.
    pub message_id: String,
    /// Sender wall-clock time (ms since epoch).
    pub timestamp: u64,
    /// Sender role.
    pub source: SourceRole,
    /// Addressee role. `None` means broadcast.
    pub target: Option<SourceRole>,
    /// Protocol version string.
    pub version: String,
    /// Id of the request this message answers.
    pub correlation_id: Option<String>,
    /// Requester deadline, advisory to the correlation handler.
    pub timeout_ms: Option<u64>,
    /// Auxiliary key/value pairs.
    pub metadata: Option<JsonMap>,
    /// Typed body; determines `type` on the wire.
    pub payload: Payload,
}

impl Message {
    /// Create an envelope with a fresh id, the current time and the default
    /// protocol version.
    pub fn new(source: SourceRole, payload: Payload) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            timestamp: now_ms(),
            source,
            target: None,
            version: PROTOCOL_VERSION.to_string(),
            correlation_id: None,
            timeout_ms: None,
            metadata: None,
            payload,
        }
    }

    /// The `type` discriminant.
    #[must_use]
    pub fn kind(&self) -> MessageType {
        self.payload.message_type()
    }

    /// True when the message has no addressee.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.target.is_none()
    }

    /// True when the sender asked for an `ack`.
    #[must_use]
    pub fn requires_ack(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(REQUIRES_ACK_KEY))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn with_target(mut self, target: SourceRole) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(JsonMap::new)
            .insert(key.into(), value);
        self
    }

    /// Build a reply: addressed to this message's sender and correlated with
    /// its id.
    pub fn reply(&self, source: SourceRole, payload: Payload) -> Message {
        Message::new(source, payload)
            .with_target(self.source)
            .with_correlation_id(self.message_id.clone())
    }

    /// Requester deadline as a `Duration`, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Encode as a JSON value.
    pub fn to_value(&self) -> Result<Value, ProtocolError> {
        serde_json::to_value(self).map_err(ProtocolError::Encode)
    }
}

/// Flat wire representation of [`Message`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    message_id: String,
    #[serde(rename = "type")]
    kind: MessageType,
    timestamp: u64,
    source: SourceRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<SourceRole>,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<JsonMap>,
    #[serde(default)]
    payload: Value,
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let payload = self.payload.to_value().map_err(S::Error::custom)?;
        WireEnvelope {
            message_id: self.message_id.clone(),
            kind: self.kind(),
            timestamp: self.timestamp,
            source: self.source,
            target: self.target,
            version: self.version.clone(),
            correlation_id: self.correlation_id.clone(),
            timeout_ms: self.timeout_ms,
            metadata: self.metadata.clone(),
            payload,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = WireEnvelope::deserialize(deserializer)?;
        let payload = Payload::from_value(wire.kind, wire.payload).map_err(D::Error::custom)?;
        Ok(Message {
            message_id: wire.message_id,
            timestamp: wire.timestamp,
            source: wire.source,
            target: wire.target,
            version: wire.version,
            correlation_id: wire.correlation_id,
            timeout_ms: wire.timeout_ms,
            metadata: wire.metadata,
            payload,
        })
    }
}
