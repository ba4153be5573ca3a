use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Result;
use crate::ws::{WsError, WsMessage};

/// Reply types pushed by the monitor sockets.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKind {
    ServerOverview,
    RedisOverview,
    DatabaseOverview,
    /// Server monitor realtime statistics
    RealtimeStats,
    RedisRealtime,
    DatabaseRealtime,
    DatabaseConfigs,
    /// Result of a `test_connection` probe
    ConnectionTest,
    MonitorStarted,
    MonitorStopped,
    /// Monitoring was already running
    MonitorStatus,
    Notification,
    Error,
    Other(String),
}

impl ReplyKind {
    #[must_use]
    pub fn from_type(msg_type: &str) -> Self {
        match msg_type {
            "server_overview" => Self::ServerOverview,
            "redis_overview" => Self::RedisOverview,
            "database_overview" => Self::DatabaseOverview,
            "realtime_stats" => Self::RealtimeStats,
            "redis_realtime" => Self::RedisRealtime,
            "database_realtime" => Self::DatabaseRealtime,
            "database_configs" => Self::DatabaseConfigs,
            "connection_test" => Self::ConnectionTest,
            "monitor_started" => Self::MonitorStarted,
            "monitor_stopped" => Self::MonitorStopped,
            "monitor_status" => Self::MonitorStatus,
            "notification" => Self::Notification,
            "error" => Self::Error,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// A backend reply: `{type, message, data, timestamp}`.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct MonitorReply {
    pub kind: ReplyKind,
    pub message: Option<String>,
    pub data: Option<Value>,
    pub timestamp: Option<String>,
}

impl MonitorReply {
    /// Deserialize `data` into a typed payload such as [`ServerMonitorData`].
    ///
    /// A payload that does not match `T` fails with [`WsError::MessageParse`].
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.data
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| WsError::MessageParse(e).into())
    }
}

impl From<&WsMessage> for MonitorReply {
    fn from(message: &WsMessage) -> Self {
        Self {
            kind: ReplyKind::from_type(&message.msg_type),
            message: message.text().map(ToOwned::to_owned),
            data: message.data().cloned(),
            timestamp: message.timestamp().map(ToOwned::to_owned),
        }
    }
}

/// Server monitor overview and realtime payload. Sections are passed through as collected.
#[non_exhaustive]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerMonitorData {
    pub basic_info: Option<Value>,
    pub cpu_info: Option<Value>,
    pub memory_info: Option<Value>,
    pub disk_info: Option<Value>,
    pub network_info: Option<Value>,
    pub process_info: Option<Value>,
    pub system_load: Option<Value>,
    pub boot_time: Option<Value>,
    pub users_info: Option<Value>,
    pub timestamp: Option<String>,
}

/// Redis monitor overview and realtime payload.
#[non_exhaustive]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisMonitorData {
    pub connection_id: Option<String>,
    pub connection_name: Option<String>,
    pub status: Option<String>,
    pub info: Option<Value>,
    pub memory: Option<Value>,
    pub stats: Option<Value>,
    #[serde(default)]
    pub keyspace: Vec<Value>,
    #[serde(default)]
    pub clients: Vec<Value>,
    #[serde(default)]
    pub slow_log: Vec<Value>,
    pub timestamp: Option<String>,
}
