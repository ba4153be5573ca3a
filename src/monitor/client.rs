use std::ops::Deref;

use super::types::request::{MonitorAction, MonitorRequest};
use crate::Result;
use crate::auth::TokenProvider;
use crate::endpoint::{Channel, Origin, create_websocket};
use crate::ws::config::Config;
use crate::ws::{Callbacks, WebSocketManager};

/// Server or Redis monitor socket.
///
/// Every connection method of [`WebSocketManager`] is available through [`Deref`]; the methods
/// here only shape the monitor commands. Each returns whether the command was sent.
///
/// # Example
///
/// ```rust, no_run
/// use admin_monitor_ws::auth::StaticToken;
/// use admin_monitor_ws::endpoint::Origin;
/// use admin_monitor_ws::monitor::{MonitorManager, MonitorReply};
/// use admin_monitor_ws::ws::Callbacks;
///
/// # async fn example() -> admin_monitor_ws::Result<()> {
/// let callbacks = Callbacks::new().on_message(|message| {
///     let reply = MonitorReply::from(message);
///     println!("{:?}: {:?}", reply.kind, reply.message);
/// });
/// let monitor = MonitorManager::server(&Origin::from_env()?, StaticToken::new("..."), callbacks)?;
///
/// monitor.connect().await?;
/// assert!(monitor.get_overview());
/// assert!(monitor.start_monitoring());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MonitorManager {
    connection: WebSocketManager,
}

impl MonitorManager {
    /// Monitor with a custom connection configuration.
    pub fn new<T: TokenProvider>(config: Config, tokens: T, callbacks: Callbacks) -> Result<Self> {
        Ok(Self {
            connection: WebSocketManager::new(config, tokens, callbacks)?,
        })
    }

    /// Monitor for the server-monitor socket at `origin`.
    pub fn server<T: TokenProvider>(
        origin: &Origin,
        tokens: T,
        callbacks: Callbacks,
    ) -> Result<Self> {
        Ok(Self {
            connection: create_websocket(origin, Channel::ServerMonitor, tokens, callbacks)?,
        })
    }

    /// Monitor for the Redis-monitor socket at `origin`.
    pub fn redis<T: TokenProvider>(origin: &Origin, tokens: T, callbacks: Callbacks) -> Result<Self> {
        Ok(Self {
            connection: create_websocket(origin, Channel::RedisMonitor, tokens, callbacks)?,
        })
    }

    #[must_use]
    pub fn get_overview(&self) -> bool {
        self.request(MonitorAction::GetOverview)
    }

    #[must_use]
    pub fn get_realtime(&self) -> bool {
        self.request(MonitorAction::GetRealtime)
    }

    #[must_use]
    pub fn start_monitoring(&self) -> bool {
        self.request(MonitorAction::StartMonitor)
    }

    #[must_use]
    pub fn stop_monitoring(&self) -> bool {
        self.request(MonitorAction::StopMonitor)
    }

    /// Probe the monitored Redis instance.
    #[must_use]
    pub fn test_connection(&self) -> bool {
        self.request(MonitorAction::TestConnection)
    }

    fn request(&self, action: MonitorAction) -> bool {
        self.connection.send(&MonitorRequest::new(action))
    }
}

impl Deref for MonitorManager {
    type Target = WebSocketManager;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

/// Database monitor socket. Database-scoped commands name their target with `db_name`.
#[derive(Clone)]
pub struct DatabaseMonitorManager {
    connection: WebSocketManager,
}

impl DatabaseMonitorManager {
    /// Monitor for the database-monitor socket at `origin`.
    pub fn new<T: TokenProvider>(origin: &Origin, tokens: T, callbacks: Callbacks) -> Result<Self> {
        Ok(Self {
            connection: create_websocket(origin, Channel::DatabaseMonitor, tokens, callbacks)?,
        })
    }

    /// Monitor with a custom connection configuration.
    pub fn with_config<T: TokenProvider>(
        config: Config,
        tokens: T,
        callbacks: Callbacks,
    ) -> Result<Self> {
        Ok(Self {
            connection: WebSocketManager::new(config, tokens, callbacks)?,
        })
    }

    /// Request the list of configured databases.
    #[must_use]
    pub fn get_configs(&self) -> bool {
        self.connection
            .send(&MonitorRequest::new(MonitorAction::GetConfigs))
    }

    #[must_use]
    pub fn get_overview(&self, db_name: &str) -> bool {
        self.request(MonitorAction::GetOverview, db_name)
    }

    #[must_use]
    pub fn get_realtime(&self, db_name: &str) -> bool {
        self.request(MonitorAction::GetRealtime, db_name)
    }

    #[must_use]
    pub fn start_monitoring(&self, db_name: &str) -> bool {
        self.request(MonitorAction::StartMonitor, db_name)
    }

    #[must_use]
    pub fn stop_monitoring(&self) -> bool {
        self.connection
            .send(&MonitorRequest::new(MonitorAction::StopMonitor))
    }

    #[must_use]
    pub fn test_connection(&self, db_name: &str) -> bool {
        self.request(MonitorAction::TestConnection, db_name)
    }

    fn request(&self, action: MonitorAction, db_name: &str) -> bool {
        self.connection
            .send(&MonitorRequest::for_database(action, db_name))
    }
}

impl Deref for DatabaseMonitorManager {
    type Target = WebSocketManager;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}
