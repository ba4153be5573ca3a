use bon::Builder;
use serde::Serialize;

use crate::ws::message::now_iso8601;

/// Commands understood by the monitor sockets.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MonitorAction {
    /// List the configured databases (database monitor only)
    GetConfigs,
    GetOverview,
    GetRealtime,
    /// Start periodic `*_realtime` pushes
    StartMonitor,
    StopMonitor,
    /// Probe the monitored Redis instance or database
    TestConnection,
}

/// Monitor command envelope.
///
/// ```
/// use admin_monitor_ws::monitor::{MonitorAction, MonitorRequest};
///
/// let request = MonitorRequest::builder()
///     .action(MonitorAction::GetOverview)
///     .db_name("default")
///     .build();
///
/// let json = serde_json::to_value(&request).unwrap();
/// assert_eq!(json["type"], "get_overview");
/// assert_eq!(json["db_name"], "default");
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Builder)]
pub struct MonitorRequest {
    #[serde(rename = "type")]
    pub action: MonitorAction,
    /// Target database, required by the database monitor for database-scoped actions
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    /// ISO-8601 send time, defaults to now
    #[builder(into, default = now_iso8601())]
    pub timestamp: String,
}

impl MonitorRequest {
    /// Request for `action`, stamped with the current time.
    #[must_use]
    pub fn new(action: MonitorAction) -> Self {
        Self::builder().action(action).build()
    }

    /// Request for `action` on database `db_name`, stamped with the current time.
    #[must_use]
    pub fn for_database<S: Into<String>>(action: MonitorAction, db_name: S) -> Self {
        Self::builder().action(action).db_name(db_name).build()
    }
}
