//! Connection lifecycle hooks.
//!
//! All hooks are optional. They run on the connection task, so they should hand work off
//! instead of blocking.
//!
//! ```
//! use admin_monitor_ws::ws::Callbacks;
//!
//! let callbacks = Callbacks::new()
//!     .on_open(|| println!("connected"))
//!     .on_message(|message| println!("{}", message.msg_type))
//!     .on_reconnect(|attempt| println!("reconnecting ({attempt})"));
//! ```

use std::fmt;
use std::sync::Arc;

use super::message::WsMessage;
use super::state::CloseInfo;
use crate::error::Error;

type OpenHook = Arc<dyn Fn() + Send + Sync>;
type MessageHook = Arc<dyn Fn(&WsMessage) + Send + Sync>;
type CloseHook = Arc<dyn Fn(&CloseInfo) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;
type ReconnectHook = Arc<dyn Fn(u32) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Callbacks {
    open: Option<OpenHook>,
    message: Option<MessageHook>,
    close: Option<CloseHook>,
    error: Option<ErrorHook>,
    reconnect: Option<ReconnectHook>,
}

impl Callbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fired once the handshake completes.
    #[must_use]
    pub fn on_open<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.open = Some(Arc::new(f));
        self
    }

    /// Fired for every inbound message except heartbeat replies.
    #[must_use]
    pub fn on_message<F: Fn(&WsMessage) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.message = Some(Arc::new(f));
        self
    }

    /// Fired whenever the transport closes, for any reason.
    #[must_use]
    pub fn on_close<F: Fn(&CloseInfo) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.close = Some(Arc::new(f));
        self
    }

    /// Fired when the handshake fails.
    #[must_use]
    pub fn on_error<F: Fn(&Error) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    /// Fired with the attempt number each time a reconnection is scheduled.
    #[must_use]
    pub fn on_reconnect<F: Fn(u32) + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.reconnect = Some(Arc::new(f));
        self
    }

    pub(crate) fn opened(&self) {
        if let Some(f) = &self.open {
            f();
        }
    }

    pub(crate) fn message(&self, message: &WsMessage) {
        if let Some(f) = &self.message {
            f(message);
        }
    }

    pub(crate) fn closed(&self, info: &CloseInfo) {
        if let Some(f) = &self.close {
            f(info);
        }
    }

    pub(crate) fn errored(&self, error: &Error) {
        if let Some(f) = &self.error {
            f(error);
        }
    }

    pub(crate) fn reconnecting(&self, attempt: u32) {
        if let Some(f) = &self.reconnect {
            f(attempt);
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.open.is_some())
            .field("on_message", &self.message.is_some())
            .field("on_close", &self.close.is_some())
            .field("on_error", &self.error.is_some())
            .field("on_reconnect", &self.reconnect.is_some())
            .finish()
    }
}
