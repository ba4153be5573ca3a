#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Not every test crate uses every helper"
)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use admin_monitor_ws::ws::{Callbacks, CloseInfo, WsMessage};
use futures_util::{SinkExt as _, StreamExt as _};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

pub const TOKEN: &str = "test-token";

/// What the server pushes to every connected client.
#[derive(Debug, Clone)]
enum Outbound {
    Text(String),
    Close(u16, String),
    /// Drop the TCP connection without a closing handshake
    Drop,
}

/// Upgrade request as seen by the server.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub uri: String,
    pub protocols: Option<String>,
}

/// Mock WebSocket server.
pub struct MockWsServer {
    addr: SocketAddr,
    /// Pushes frames to ALL connected clients
    outbound_tx: broadcast::Sender<Outbound>,
    /// Text frames received from clients
    received_rx: mpsc::UnboundedReceiver<String>,
    handshakes: Arc<Mutex<Vec<Handshake>>>,
    /// TCP connections accepted, including refused ones
    connections: Arc<AtomicUsize>,
    /// Drop new connections before the WebSocket handshake
    refuse: Arc<AtomicBool>,
    /// Echo every text frame back to its sender
    echo: Arc<AtomicBool>,
}

impl MockWsServer {
    /// Start a mock WebSocket server on a random port.
    pub async fn start() -> Self {
        Self::start_with_delay(Duration::ZERO).await
    }

    /// Start a server that waits `delay` before answering each upgrade request.
    pub async fn start_with_delay(delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (outbound_tx, _) = broadcast::channel::<Outbound>(100);
        let (received_tx, received_rx) = mpsc::unbounded_channel::<String>();
        let handshakes = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let refuse = Arc::new(AtomicBool::new(false));
        let echo = Arc::new(AtomicBool::new(false));

        let server = Self {
            addr,
            outbound_tx: outbound_tx.clone(),
            received_rx,
            handshakes: Arc::clone(&handshakes),
            connections: Arc::clone(&connections),
            refuse: Arc::clone(&refuse),
            echo: Arc::clone(&echo),
        };

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                connections.fetch_add(1, Ordering::SeqCst);

                if refuse.load(Ordering::SeqCst) {
                    drop(stream);
                    continue;
                }

                let received_tx = received_tx.clone();
                let mut outbound_rx = outbound_tx.subscribe();
                let handshakes = Arc::clone(&handshakes);
                let echo = Arc::clone(&echo);

                tokio::spawn(async move {
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }

                    let record = move |request: &Request,
                                       mut response: Response|
                          -> Result<Response, ErrorResponse> {
                        let protocols = request
                            .headers()
                            .get(SEC_WEBSOCKET_PROTOCOL)
                            .map(|value| value.to_str().unwrap().to_owned());

                        // Agree to the first offered sub-protocol
                        if let Some(first) = protocols
                            .as_deref()
                            .and_then(|offered| offered.split(',').next())
                        {
                            response
                                .headers_mut()
                                .insert(SEC_WEBSOCKET_PROTOCOL, first.trim().parse().unwrap());
                        }

                        handshakes.lock().unwrap().push(Handshake {
                            uri: request.uri().to_string(),
                            protocols,
                        });
                        Ok(response)
                    };

                    let Ok(ws_stream) = tokio_tungstenite::accept_hdr_async(stream, record).await
                    else {
                        return;
                    };
                    let (mut write, mut read) = ws_stream.split();

                    loop {
                        tokio::select! {
                            frame = read.next() => {
                                match frame {
                                    Some(Ok(Message::Text(text))) => {
                                        if echo.load(Ordering::SeqCst)
                                            && write.send(Message::Text(text.clone())).await.is_err()
                                        {
                                            break;
                                        }
                                        drop(received_tx.send(text.to_string()));
                                    }
                                    // Close replies are flushed by the next read
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                            outbound = outbound_rx.recv() => {
                                match outbound {
                                    Ok(Outbound::Text(text)) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(Outbound::Close(code, reason)) => {
                                        let frame = CloseFrame {
                                            code: code.into(),
                                            reason: reason.into(),
                                        };
                                        if write.send(Message::Close(Some(frame))).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(Outbound::Drop) | Err(_) => break,
                                }
                            }
                        }
                    }
                });
            }
        });

        server
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// `host:port` of the server, usable as an origin host.
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// Send a text frame to all connected clients.
    pub fn send(&self, message: &str) {
        drop(self.outbound_tx.send(Outbound::Text(message.to_owned())));
    }

    /// Start a closing handshake with all connected clients.
    pub fn close_all(&self, code: u16, reason: &str) {
        drop(self.outbound_tx.send(Outbound::Close(code, reason.to_owned())));
    }

    /// Drop all connected clients without a closing handshake.
    pub fn drop_all(&self) {
        drop(self.outbound_tx.send(Outbound::Drop));
    }

    /// Refuse (or accept again) new connections.
    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn echo(&self, echo: bool) {
        self.echo.store(echo, Ordering::SeqCst);
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn handshakes(&self) -> Vec<Handshake> {
        self.handshakes.lock().unwrap().clone()
    }

    /// Receive the next text frame sent by a client.
    pub async fn recv(&mut self) -> Option<String> {
        timeout(Duration::from_secs(2), self.received_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Receive the next client frame, parsed as JSON.
    pub async fn recv_json(&mut self) -> serde_json::Value {
        serde_json::from_str(&self.recv().await.unwrap()).unwrap()
    }

    /// Every text frame received so far, without waiting.
    pub fn drain(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.received_rx.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

/// Callback invocation, in the order it happened.
#[derive(Debug)]
pub enum Event {
    Open,
    Message(WsMessage),
    Close(CloseInfo),
    Error(String),
    Reconnect(u32),
}

/// Callbacks that record every invocation.
pub fn recording_callbacks() -> (Callbacks, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let open = tx.clone();
    let message = tx.clone();
    let close = tx.clone();
    let error = tx.clone();
    let callbacks = Callbacks::new()
        .on_open(move || drop(open.send(Event::Open)))
        .on_message(move |m| drop(message.send(Event::Message(m.clone()))))
        .on_close(move |info| drop(close.send(Event::Close(info.clone()))))
        .on_error(move |e| drop(error.send(Event::Error(e.to_string()))))
        .on_reconnect(move |attempt| drop(tx.send(Event::Reconnect(attempt))));

    (callbacks, rx)
}

/// Next recorded event, failing the test after two seconds.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for a callback")
        .expect("callback channel closed")
}

/// Events recorded within `window`.
pub async fn events_within(
    events: &mut mpsc::UnboundedReceiver<Event>,
    window: Duration,
) -> Vec<Event> {
    sleep(window).await;

    let mut recorded = Vec::new();
    while let Ok(event) = events.try_recv() {
        recorded.push(event);
    }
    recorded
}
