//! Core WebSocket infrastructure.
//!
//! This module provides the generic connection manager that the monitor managers in
//! [`crate::monitor`] build on.
//!
//! # Architecture
//!
//! - [`WebSocketManager`]: token-authenticated connection with heartbeat and bounded reconnection
//! - [`Callbacks`]: optional lifecycle hooks (`on_open`, `on_message`, `on_close`, `on_error`,
//!   `on_reconnect`)
//! - [`WsMessage`]: the JSON envelope exchanged with the backend
//!
//! # Example
//!
//! ```ignore
//! let manager = WebSocketManager::new(Config::new(url), StaticToken::new(token), Callbacks::new())?;
//! manager.connect().await?;
//!
//! let mut rx = manager.subscribe();
//! while let Ok(message) = rx.recv().await {
//!     println!("Received: {message:?}");
//! }
//! ```

pub mod callbacks;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod state;

pub use callbacks::Callbacks;
pub use connection::WebSocketManager;
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use message::WsMessage;
pub use state::{CloseInfo, ConnectionState};
