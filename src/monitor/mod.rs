//! Live server, Redis and database monitoring.
//!
//! The monitor sockets accept a small command set ([`MonitorAction`]) and push replies of the
//! shape `{type, message, data, timestamp}` ([`MonitorReply`]). `start_monitor` makes the
//! backend push realtime statistics periodically until `stop_monitor`.
//!
//! # Example
//!
//! ```rust, no_run
//! use admin_monitor_ws::auth::StaticToken;
//! use admin_monitor_ws::endpoint::Origin;
//! use admin_monitor_ws::monitor::{DatabaseMonitorManager, MonitorReply, ReplyKind};
//! use admin_monitor_ws::ws::Callbacks;
//! use futures::StreamExt as _;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let monitor = DatabaseMonitorManager::new(
//!         &Origin::development(),
//!         StaticToken::new("eyJhbGciOi..."),
//!         Callbacks::new(),
//!     )?;
//!     let mut messages = Box::pin(monitor.messages());
//!
//!     monitor.connect().await?;
//!     assert!(monitor.start_monitoring("default"));
//!
//!     while let Some(message) = messages.next().await {
//!         let reply = MonitorReply::from(&message?);
//!         if reply.kind == ReplyKind::DatabaseRealtime {
//!             println!("{:?}", reply.data);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod types;

pub use client::{DatabaseMonitorManager, MonitorManager};
pub use types::request::{MonitorAction, MonitorRequest};
pub use types::response::{MonitorReply, RedisMonitorData, ReplyKind, ServerMonitorData};
