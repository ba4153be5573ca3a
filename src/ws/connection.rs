use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_stream::try_stream;
use futures::{SinkExt as _, Stream, StreamExt as _};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, sleep};
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::callbacks::Callbacks;
use super::config::Config;
use super::error::WsError;
use super::message::{PONG, WsMessage};
use super::state::{CLOSE_NORMAL, CloseInfo, ConnectionState};
use crate::Result;
use crate::auth::{TokenProvider, current_token};
use crate::error::{Error, Kind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Broadcast channel capacity for incoming messages.
const BROADCAST_CAPACITY: usize = 1024;

/// How long a connection task waits for the peer to answer a close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Work handed to the task that owns the socket.
#[derive(Debug)]
enum Command {
    Text(String),
    Close(CloseFrame),
}

/// The transport the manager currently owns.
///
/// Every `connect` starts a new generation. Events from tasks of an older generation are
/// ignored, so a transport torn down by `close` can never move the state or schedule a
/// reconnect after the fact.
#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    /// Cancels the handshake of an in-flight `connect`
    handshake: Option<CancellationToken>,
    /// Outgoing queue of the open connection
    commands: Option<mpsc::UnboundedSender<Command>>,
}

/// Manages a single authenticated WebSocket connection: lifecycle, heartbeat and reconnection.
///
/// - [`connect`](Self::connect) authenticates with the token from the [`TokenProvider`] and
///   resolves once the socket is open.
/// - While open, a `{"type":"ping"}` message is sent every `heartbeat_interval`; `pong` replies
///   are consumed here and never reach subscribers.
/// - When the socket closes without a prior [`close`](Self::close), up to
///   `max_reconnect_attempts` reconnections are made, `reconnect_interval` apart.
/// - Inbound messages go to the `on_message` callback and to every [`subscribe`](Self::subscribe)r.
///
/// Cloning is cheap and every clone drives the same connection. Dropping the last clone tears
/// the connection down like [`close`](Self::close).
///
/// # Example
///
/// ```rust, no_run
/// use admin_monitor_ws::auth::StaticToken;
/// use admin_monitor_ws::ws::config::Config;
/// use admin_monitor_ws::ws::{Callbacks, WebSocketManager, WsMessage};
///
/// # async fn example() -> admin_monitor_ws::Result<()> {
/// let callbacks = Callbacks::new().on_message(|message| println!("{message:?}"));
/// let manager = WebSocketManager::new(
///     Config::new("ws://localhost:8000/ws/test/"),
///     StaticToken::new("eyJhbGciOi..."),
///     callbacks,
/// )?;
///
/// manager.connect().await?;
/// assert!(manager.send(&WsMessage::new("echo").with_field("content", "hello")));
/// manager.close(None, None);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WebSocketManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    endpoint: Url,
    tokens: Box<dyn TokenProvider>,
    callbacks: Callbacks,
    /// Watch channel sender for state changes
    state_tx: watch::Sender<ConnectionState>,
    /// Broadcast sender for incoming messages
    broadcast_tx: broadcast::Sender<WsMessage>,
    reconnect_attempts: AtomicU32,
    manual_close: AtomicBool,
    slot: Mutex<Slot>,
    heartbeat: Mutex<Option<CancellationToken>>,
    reconnect_timer: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketManager {
    /// Create a manager for `config`. Nothing is connected until [`connect`](Self::connect).
    pub fn new<T: TokenProvider>(config: Config, tokens: T, callbacks: Callbacks) -> Result<Self> {
        let endpoint = config.endpoint()?;
        if config.heartbeat && config.heartbeat_interval.is_zero() {
            return Err(Error::validation("heartbeat interval must be greater than zero"));
        }

        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                endpoint,
                tokens: Box::new(tokens),
                callbacks,
                state_tx,
                broadcast_tx,
                reconnect_attempts: AtomicU32::new(0),
                manual_close: AtomicBool::new(false),
                slot: Mutex::new(Slot::default()),
                heartbeat: Mutex::new(None),
                reconnect_timer: Mutex::new(None),
            }),
        })
    }

    /// Open the connection.
    ///
    /// Resolves once the handshake completes. Fails immediately, without any network traffic,
    /// when the token provider has no token. Only one attempt may be in flight at a time: a
    /// second call while connecting fails with [`WsError::AlreadyConnecting`], and a call while
    /// already open resolves without opening another socket.
    pub async fn connect(&self) -> Result<()> {
        Inner::connect(&self.inner).await
    }

    /// Close the connection and stop heartbeat and reconnection.
    ///
    /// `code` defaults to 1000. Safe to call in any state, any number of times.
    pub fn close(&self, code: Option<u16>, reason: Option<&str>) {
        self.inner.close(code, reason);
    }

    /// Send `message` as a JSON text frame.
    ///
    /// Returns `false`, without writing anything, when the connection is not open or the
    /// message cannot be serialized.
    #[must_use]
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        self.inner.send(message)
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Subscribe to incoming messages.
    ///
    /// Each call returns a new independent receiver. Heartbeat replies are never broadcast.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Incoming messages as a stream, ending when the manager is dropped.
    ///
    /// A consumer that falls more than the channel capacity behind receives
    /// [`WsError::Lagged`] and then continues with the newest messages.
    pub fn messages(&self) -> impl Stream<Item = Result<WsMessage>> + use<> {
        let mut rx = self.subscribe();

        try_stream! {
            loop {
                match rx.recv().await {
                    Ok(message) => yield message,
                    Err(RecvError::Lagged(n)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("WebSocket message stream lagged, missed {n} messages");
                        Err(WsError::Lagged { count: n })?;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Reconnection attempts made since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Whether a reconnection attempt is scheduled and has not fired yet.
    #[must_use]
    pub fn has_pending_reconnect(&self) -> bool {
        self.inner
            .reconnect_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Whether the heartbeat timer is running.
    #[must_use]
    pub fn is_heartbeat_running(&self) -> bool {
        self.inner
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

impl Inner {
    // The slot holds no invariant a panicking holder could break halfway, so poisoning is ignored.
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a new transport may be opened: `false` when one is already open, an error when
    /// a handshake is in flight.
    fn may_open(&self) -> Result<bool> {
        match *self.state_tx.borrow() {
            ConnectionState::Connecting => Err(WsError::AlreadyConnecting.into()),
            ConnectionState::Open => Ok(false),
            ConnectionState::Closed | ConnectionState::Closing => Ok(true),
        }
    }

    async fn connect(this: &Arc<Self>) -> Result<()> {
        if !this.may_open()? {
            return Ok(());
        }

        let token = current_token(this.tokens.as_ref()).ok_or(WsError::TokenUnavailable)?;
        let request = this.request(&token)?;

        let (generation, cancel) = {
            let mut slot = this.slot();
            // State may have moved while the token was read
            if !this.may_open()? {
                return Ok(());
            }

            this.manual_close.store(false, Ordering::SeqCst);
            slot.generation = slot.generation.wrapping_add(1);
            slot.commands = None;
            let cancel = CancellationToken::new();
            slot.handshake = Some(cancel.clone());
            this.state_tx.send_replace(ConnectionState::Connecting);

            (slot.generation, cancel)
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            url = %crate::auth::redact_token(&request.uri().to_string()),
            "Connecting to WebSocket"
        );

        let result = tokio::select! {
            result = connect_async(request) => result,
            () = cancel.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("WebSocket handshake aborted by close");
                return Err(WsError::ConnectionClosed.into());
            }
        };

        match result {
            Ok((stream, _)) => Self::opened(this, generation, stream),
            Err(e) => Err(this.handshake_failed(generation, e.into())),
        }
    }

    /// Final URL: the configured endpoint with the `token` query parameter appended.
    fn request(&self, token: &SecretString) -> Result<Request> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("token", token.expose_secret());

        let mut request = url.as_str().into_client_request()?;
        if !self.config.protocols.is_empty() {
            let protocols = HeaderValue::from_str(&self.config.protocols.join(", "))
                .map_err(|e| Error::with_source(Kind::Validation, e))?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocols);
        }

        Ok(request)
    }

    fn opened(this: &Arc<Self>, generation: u64, stream: WsStream) -> Result<()> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        {
            let mut slot = this.slot();
            if slot.generation != generation || this.manual_close.load(Ordering::SeqCst) {
                // `close` won the race against the handshake
                drop(slot);
                tokio::spawn(async move {
                    let mut stream = stream;
                    _ = stream.close(None).await;
                });
                return Err(WsError::ConnectionClosed.into());
            }

            slot.handshake = None;
            slot.commands = Some(commands_tx);
            this.reconnect_attempts.store(0, Ordering::SeqCst);
            this.state_tx.send_replace(ConnectionState::Open);
            // Under the slot lock so a concurrent `close` always finds the heartbeat to stop
            this.start_heartbeat();
        }

        #[cfg(feature = "tracing")]
        tracing::info!("WebSocket connection established");

        this.callbacks.opened();

        tokio::spawn(Self::connection_loop(
            Arc::downgrade(this),
            generation,
            stream,
            commands_rx,
        ));

        Ok(())
    }

    /// A failed handshake behaves like a socket that errors and then closes: `on_error`, then
    /// `on_close`, then the reconnection policy.
    fn handshake_failed(self: &Arc<Self>, generation: u64, error: Error) -> Error {
        {
            let mut slot = self.slot();
            if slot.generation != generation {
                return error;
            }
            slot.handshake = None;
            self.state_tx.send_replace(ConnectionState::Closed);
        }

        #[cfg(feature = "tracing")]
        tracing::warn!("Unable to connect: {error:?}");

        self.callbacks.errored(&error);
        self.after_close(&CloseInfo::abnormal());

        error
    }

    /// Owns the socket until it closes.
    async fn connection_loop(
        inner: Weak<Self>,
        generation: u64,
        stream: WsStream,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let (mut write, mut read) = stream.split();

        let mut received: Option<CloseInfo> = None;
        let mut closing = false;
        let close_deadline = sleep(CLOSE_TIMEOUT);
        tokio::pin!(close_deadline);

        loop {
            tokio::select! {
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            #[cfg(feature = "tracing")]
                            tracing::trace!(%text, "Received WebSocket text message");

                            if let Some(inner) = inner.upgrade() {
                                inner.dispatch(text.as_str());
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            received = Some(CloseInfo::from(frame));
                            if let Some(inner) = inner.upgrade() {
                                inner.set_state(generation, ConnectionState::Closing);
                            }
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            #[cfg(feature = "tracing")]
                            tracing::debug!(len = bytes.len(), "Dropping binary WebSocket frame");
                            #[cfg(not(feature = "tracing"))]
                            let _ = &bytes;
                        }
                        Some(Ok(_)) => {
                            // Transport pings are answered by tungstenite
                        }
                        Some(Err(e)) => {
                            #[cfg(feature = "tracing")]
                            tracing::debug!(error = %e, "WebSocket transport finished with error");
                            #[cfg(not(feature = "tracing"))]
                            let _ = &e;
                            break;
                        }
                        None => break,
                    }
                }

                command = commands.recv(), if !closing => {
                    match command {
                        Some(Command::Text(text)) => {
                            if write.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Some(Command::Close(frame)) => {
                            closing = true;
                            close_deadline.as_mut().reset(Instant::now() + CLOSE_TIMEOUT);
                            if write.send(Message::Close(Some(frame))).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            // Manager dropped
                            closing = true;
                            close_deadline.as_mut().reset(Instant::now() + CLOSE_TIMEOUT);
                            if write.send(Message::Close(None)).await.is_err() {
                                break;
                            }
                        }
                    }
                }

                () = &mut close_deadline, if closing => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Peer did not answer close frame in time");
                    break;
                }
            }
        }

        let info = received.unwrap_or_else(CloseInfo::abnormal);
        if let Some(inner) = inner.upgrade() {
            inner.transport_closed(generation, &info);
        }
    }

    fn dispatch(&self, text: &str) {
        let message = match serde_json::from_str::<WsMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%text, error = %e, "Failed to parse WebSocket message");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                return;
            }
        };

        if message.msg_type == PONG {
            #[cfg(feature = "tracing")]
            tracing::trace!("Received heartbeat reply");
            return;
        }

        self.callbacks.message(&message);
        _ = self.broadcast_tx.send(message);
    }

    fn set_state(&self, generation: u64, state: ConnectionState) {
        let slot = self.slot();
        if slot.generation == generation {
            self.state_tx.send_replace(state);
        }
    }

    fn transport_closed(self: &Arc<Self>, generation: u64, info: &CloseInfo) {
        {
            let mut slot = self.slot();
            if slot.generation != generation {
                // Already torn down by `close` or superseded by a newer `connect`: only report
                // the close itself, whether or not the close frame was sent before the peer
                // went away
                drop(slot);
                self.callbacks.closed(info);
                return;
            }
            slot.commands = None;
            self.state_tx.send_replace(ConnectionState::Closed);
        }

        #[cfg(feature = "tracing")]
        tracing::info!(code = info.code, reason = %info.reason, "WebSocket connection closed");

        self.after_close(info);
    }

    fn after_close(self: &Arc<Self>, info: &CloseInfo) {
        self.stop_heartbeat();
        self.callbacks.closed(info);

        if !self.manual_close.load(Ordering::SeqCst) && self.config.reconnect {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        let max = self.config.max_reconnect_attempts;
        let attempt = self.reconnect_attempts.load(Ordering::SeqCst);
        if attempt >= max || self.manual_close.load(Ordering::SeqCst) {
            #[cfg(feature = "tracing")]
            tracing::warn!(max, "WebSocket reconnection attempts exhausted");
            return;
        }

        let attempt = attempt.saturating_add(1);
        self.reconnect_attempts.store(attempt, Ordering::SeqCst);

        #[cfg(feature = "tracing")]
        tracing::info!(attempt, max, "WebSocket reconnecting");

        self.callbacks.reconnecting(attempt);

        let weak = Arc::downgrade(self);
        let delay = self.config.reconnect_interval;
        let handle = tokio::spawn(async move {
            sleep(delay).await;

            let Some(inner) = weak.upgrade() else {
                return;
            };
            // The timer has fired; it is no longer pending
            drop(
                inner
                    .reconnect_timer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take(),
            );
            if inner.manual_close.load(Ordering::SeqCst) {
                return;
            }

            if let Err(e) = Self::connect(&inner).await {
                #[cfg(feature = "tracing")]
                tracing::warn!("WebSocket reconnection failed: {e}");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
            }
        });

        let previous = self
            .reconnect_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn cancel_reconnect(&self) {
        let handle = self
            .reconnect_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn start_heartbeat(self: &Arc<Self>) {
        if !self.config.heartbeat {
            return;
        }

        let token = CancellationToken::new();
        let previous = self
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let weak = Arc::downgrade(self);
        let period = self.config.heartbeat_interval;
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        if inner.state_tx.borrow().is_connected() {
                            #[cfg(feature = "tracing")]
                            tracing::trace!("Sending heartbeat");
                            _ = inner.send(&WsMessage::ping());
                        }
                    }
                }
            }
        });
    }

    fn stop_heartbeat(&self) {
        let token = self
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            token.cancel();
        }
    }

    fn send<T: Serialize>(&self, message: &T) -> bool {
        let slot = self.slot();
        let Some(commands) = slot.commands.as_ref() else {
            #[cfg(feature = "tracing")]
            tracing::warn!("WebSocket is not connected, message not sent");
            return false;
        };
        if !self.state_tx.borrow().is_connected() {
            #[cfg(feature = "tracing")]
            tracing::warn!("WebSocket is not connected, message not sent");
            return false;
        }

        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %e, "Failed to serialize WebSocket message");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                return false;
            }
        };

        commands.send(Command::Text(text)).is_ok()
    }

    fn close(&self, code: Option<u16>, reason: Option<&str>) {
        let frame = CloseFrame {
            code: CloseCode::from(code.unwrap_or(CLOSE_NORMAL)),
            reason: reason.unwrap_or_default().to_owned().into(),
        };

        {
            let mut slot = self.slot();
            self.manual_close.store(true, Ordering::SeqCst);
            if let Some(handshake) = slot.handshake.take() {
                handshake.cancel();
            }
            if let Some(commands) = slot.commands.take() {
                _ = commands.send(Command::Close(frame));
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.state_tx.send_replace(ConnectionState::Closed);
        }

        self.stop_heartbeat();
        self.cancel_reconnect();

        #[cfg(feature = "tracing")]
        tracing::debug!("WebSocket closed by client");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.close(None, None);
    }
}
