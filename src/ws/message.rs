use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Heartbeat request type, sent by the manager while the connection is open.
pub const PING: &str = "ping";
/// Heartbeat reply type, consumed by the manager and never delivered to subscribers.
pub const PONG: &str = "pong";

/// JSON envelope exchanged over the socket.
///
/// `type` is the discriminant; every other field, `timestamp` included, is kept verbatim in
/// [`fields`](Self::fields), so a message that is echoed back compares equal to the one sent.
///
/// Backend replies use the shape `{type, message, data, timestamp}`; [`text`](Self::text),
/// [`data`](Self::data) and [`timestamp`](Self::timestamp) read those fields.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl WsMessage {
    #[must_use]
    pub fn new<S: Into<String>>(msg_type: S) -> Self {
        Self {
            msg_type: msg_type.into(),
            fields: Map::new(),
        }
    }

    /// The heartbeat message sent on every heartbeat tick.
    #[must_use]
    pub fn ping() -> Self {
        Self::new(PING).stamped()
    }

    /// Set `timestamp` to the current time.
    #[must_use]
    pub fn stamped(self) -> Self {
        self.with_field("timestamp", now_iso8601())
    }

    #[must_use]
    pub fn with_field<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Human-readable `message` field of a backend reply.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.fields.get("message").and_then(Value::as_str)
    }

    /// ISO-8601 `timestamp`, when present as a string.
    #[must_use]
    pub fn timestamp(&self) -> Option<&str> {
        self.fields.get("timestamp").and_then(Value::as_str)
    }

    /// `data` payload of a backend reply.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.fields.get("data")
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.msg_type == "error"
    }

    /// Whether this is a heartbeat message that never reaches subscribers.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.msg_type == PING || self.msg_type == PONG
    }
}

pub(crate) fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
