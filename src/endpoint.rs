//! Where the backend's sockets live.
//!
//! Socket URLs are an [`Origin`] (scheme and host) plus a [`Channel`] path. During development
//! the backend runs on `localhost:8000`; in production the sockets are served from the same host
//! as the console itself.

use std::env;
use std::fmt;

use url::Url;

use crate::Result;
use crate::auth::TokenProvider;
use crate::error::Error;
use crate::ws::config::Config;
use crate::ws::{Callbacks, WebSocketManager};

/// Environment variable holding the socket origin, e.g. `wss://admin.example.com`.
pub const ORIGIN_VAR: &str = "ADMIN_WS_ORIGIN";

const DEVELOPMENT_HOST: &str = "localhost:8000";

/// Scheme and host of the backend's WebSocket server.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// `wss` when true, `ws` otherwise
    pub secure: bool,
    /// Host with optional port
    pub host: String,
}

impl Origin {
    #[must_use]
    pub fn new<S: Into<String>>(host: S, secure: bool) -> Self {
        Self {
            secure,
            host: host.into(),
        }
    }

    /// The local development backend, `ws://localhost:8000`.
    #[must_use]
    pub fn development() -> Self {
        Self::new(DEVELOPMENT_HOST, false)
    }

    /// Parse an origin such as `wss://admin.example.com` or `ws://10.0.0.5:8000`.
    pub fn parse(origin: &str) -> Result<Self> {
        let url = Url::parse(origin)?;
        let secure = match url.scheme() {
            "wss" | "https" => true,
            "ws" | "http" => false,
            scheme => {
                return Err(Error::validation(format!(
                    "unsupported origin scheme `{scheme}` in {origin}"
                )));
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| Error::validation(format!("origin {origin} has no host")))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };

        Ok(Self::new(host, secure))
    }

    /// Origin from [`ORIGIN_VAR`], or [`Origin::development`] when it is unset.
    pub fn from_env() -> Result<Self> {
        match env::var(ORIGIN_VAR) {
            Ok(origin) if !origin.trim().is_empty() => Self::parse(origin.trim()),
            _ => Ok(Self::development()),
        }
    }

    #[must_use]
    pub fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    /// Full socket URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}://{}{path}", self.scheme(), self.host)
    }
}

impl Default for Origin {
    fn default() -> Self {
        Self::development()
    }
}

/// Socket endpoints served by the backend.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Echo and diagnostics
    Test,
    /// Per-user notifications
    Notifications,
    ServerMonitor,
    RedisMonitor,
    DatabaseMonitor,
}

impl Channel {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Test => "/ws/test/",
            Self::Notifications => "/ws/notifications/",
            Self::ServerMonitor => "/ws/server-monitor/",
            Self::RedisMonitor => "/ws/redis-monitor/",
            Self::DatabaseMonitor => "/ws/database-monitor/",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A [`WebSocketManager`] for `channel` with the default connection settings.
pub fn create_websocket<T: TokenProvider>(
    origin: &Origin,
    channel: Channel,
    tokens: T,
    callbacks: Callbacks,
) -> Result<WebSocketManager> {
    WebSocketManager::new(Config::new(origin.url(channel.path())), tokens, callbacks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::error::Kind;

    #[test]
    fn development_origin_points_at_local_backend() {
        let origin = Origin::development();

        assert_eq!(
            origin.url(Channel::ServerMonitor.path()),
            "ws://localhost:8000/ws/server-monitor/"
        );
    }

    #[test]
    fn secure_origin_uses_wss() {
        let origin = Origin::new("admin.example.com", true);

        assert_eq!(
            origin.url(Channel::DatabaseMonitor.path()),
            "wss://admin.example.com/ws/database-monitor/"
        );
    }

    #[test]
    fn parse_accepts_page_and_socket_schemes() {
        assert_eq!(
            Origin::parse("https://admin.example.com").unwrap(),
            Origin::new("admin.example.com", true)
        );
        assert_eq!(
            Origin::parse("ws://10.0.0.5:8000").unwrap(),
            Origin::new("10.0.0.5:8000", false)
        );
    }

    #[test]
    fn parse_rejects_other_schemes() {
        let err = Origin::parse("ftp://admin.example.com").unwrap_err();

        assert_eq!(err.kind(), Kind::Validation);
    }

    #[test]
    fn channel_paths_match_backend_routes() {
        assert_eq!(Channel::Test.to_string(), "/ws/test/");
        assert_eq!(Channel::Notifications.path(), "/ws/notifications/");
        assert_eq!(Channel::RedisMonitor.path(), "/ws/redis-monitor/");
    }

    #[test]
    fn create_websocket_uses_defaults() {
        let manager = create_websocket(
            &Origin::development(),
            Channel::Test,
            StaticToken::new("t"),
            Callbacks::new(),
        )
        .unwrap();

        let config = manager.config();
        assert_eq!(config.url, "ws://localhost:8000/ws/test/");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert!(config.heartbeat);
    }
}
