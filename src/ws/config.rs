use std::time::Duration;

use bon::Builder;
use url::Url;

use crate::Result;
use crate::error::Error;

pub(crate) const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub(crate) const DEFAULT_RECONNECT_INTERVAL_DURATION: Duration = Duration::from_millis(3000);
pub(crate) const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(30);

/// Configuration for a [`WebSocketManager`](super::WebSocketManager).
///
/// Every field other than `url` falls back to the defaults below when omitted from the builder:
///
/// | field | default |
/// |---|---|
/// | `reconnect` | `true` |
/// | `max_reconnect_attempts` | `5` |
/// | `reconnect_interval` | 3000 ms |
/// | `heartbeat` | `true` |
/// | `heartbeat_interval` | 30 s |
///
/// ```
/// use std::time::Duration;
///
/// use admin_monitor_ws::ws::config::Config;
///
/// let config = Config::builder()
///     .url("ws://localhost:8000/ws/server-monitor/")
///     .reconnect_interval(Duration::from_millis(500))
///     .build();
///
/// assert_eq!(config.max_reconnect_attempts, 5);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Endpoint the socket connects to, without the `token` query parameter
    #[builder(into)]
    pub url: String,
    /// Sub-protocols offered in the `Sec-WebSocket-Protocol` header
    #[builder(default)]
    pub protocols: Vec<String>,
    /// Whether an unexpected close schedules reconnection attempts
    #[builder(default = true)]
    pub reconnect: bool,
    /// Consecutive reconnection attempts allowed before giving up
    #[builder(default = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    pub max_reconnect_attempts: u32,
    /// Fixed delay before each reconnection attempt
    #[builder(default = DEFAULT_RECONNECT_INTERVAL_DURATION)]
    pub reconnect_interval: Duration,
    /// Whether `ping` messages are sent while the connection is open
    #[builder(default = true)]
    pub heartbeat: bool,
    /// Interval between `ping` messages
    #[builder(default = DEFAULT_HEARTBEAT_INTERVAL_DURATION)]
    pub heartbeat_interval: Duration,
}

impl Config {
    /// Configuration for `url` with every other field at its default.
    #[must_use]
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self::builder().url(url).build()
    }

    /// Parse and check the configured endpoint.
    pub(crate) fn endpoint(&self) -> Result<Url> {
        let url = Url::parse(&self.url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            scheme => Err(Error::validation(format!(
                "unsupported WebSocket scheme `{scheme}` in {}",
                self.url
            ))),
        }
    }
}
