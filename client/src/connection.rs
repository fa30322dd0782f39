//! Ownership of the single websocket to the TTS endpoint.
//!
//! [`ConnectionManager`] is the only holder of the socket. An utterance
//! borrows it through [`ConnectionManager::acquire`], which hands out an
//! [`Exchange`] guard; the guard holds the connection lock, so one request's
//! send and receive loop never interleave with another's.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The endpoint expects this exact scheme, semicolon included.
const AUTH_SCHEME: &str = "Bearer;";

/// Upper bound on a polite close handshake.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Recorded as the last error when a disconnect lands mid-connect.
const INTERRUPTED_WHILE_CONNECTING: &str = "interrupted while connecting";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// Snapshot published on every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Cause of the most recent failed connect, cleared on success.
    pub last_error: Option<String>,
}

pub struct ConnectionManager {
    config: Arc<ClientConfig>,
    socket: Mutex<Option<WsStream>>,
    status: watch::Sender<ConnectionStatus>,
}

impl ConnectionManager {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus {
            state: ConnectionState::Disconnected,
            last_error: None,
        });
        Self {
            config,
            socket: Mutex::new(None),
            status,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn last_error(&self) -> Option<String> {
        self.status.borrow().last_error.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Open a fresh socket, replacing any existing one.
    ///
    /// Failures are not raised: the manager ends `Disconnected` with the
    /// cause in [`ConnectionManager::last_error`].
    pub async fn connect(&self) -> ConnectionState {
        let mut slot = self.socket.lock().await;
        self.connect_locked(&mut slot).await
    }

    /// Connect only if not already connected.
    pub async fn ensure_connected(&self) -> ConnectionState {
        let mut slot = self.socket.lock().await;
        self.ensure_locked(&mut slot).await
    }

    /// Close the socket and end `Disconnected`, whatever happens on the way.
    ///
    /// Never waits behind an in-flight utterance: the state flips first, and
    /// an utterance blocked in [`Exchange::recv`] observes the flip and drops
    /// the socket itself.
    pub async fn disconnect(&self) {
        self.status.send_modify(|s| {
            if s.state != ConnectionState::Disconnected {
                s.state = ConnectionState::Closing;
            }
        });

        match self.socket.try_lock() {
            Ok(mut slot) => {
                if let Some(ws) = slot.take() {
                    close_quietly(ws).await;
                    info!("disconnected");
                }
            }
            Err(_) => debug!("socket busy; in-flight utterance will release it"),
        }

        self.set_state(ConnectionState::Disconnected);
    }

    /// Borrow the connection for one utterance, connecting first if needed.
    pub async fn acquire(&self) -> Result<Exchange<'_>> {
        let mut slot = self.socket.lock().await;
        if self.ensure_locked(&mut slot).await != ConnectionState::Connected {
            let cause = self
                .last_error()
                .unwrap_or_else(|| "connection unavailable".to_string());
            return Err(ClientError::Connection(cause));
        }

        Ok(Exchange {
            slot,
            status: &self.status,
            settled: false,
        })
    }

    fn set_state(&self, state: ConnectionState) {
        self.status.send_modify(|s| s.state = state);
    }

    async fn ensure_locked(&self, slot: &mut Option<WsStream>) -> ConnectionState {
        if slot.is_some() && self.state() == ConnectionState::Connected {
            return ConnectionState::Connected;
        }
        self.connect_locked(slot).await
    }

    async fn connect_locked(&self, slot: &mut Option<WsStream>) -> ConnectionState {
        if let Some(stale) = slot.take() {
            close_quietly(stale).await;
        }
        self.set_state(ConnectionState::Connecting);

        let mut attempt = 0;
        let opened = loop {
            match self.open().await {
                Ok(ws) => break Ok(ws),
                Err(e) if attempt < self.config.connect_retries => {
                    attempt += 1;
                    let delay = self.config.retry_backoff(attempt);
                    warn!(attempt, ?delay, "connect failed: {}; retrying", e);
                    tokio::time::sleep(delay).await;
                    if self.state() != ConnectionState::Connecting {
                        break Err(ClientError::ConnectionClosed);
                    }
                }
                Err(e) => break Err(e),
            }
        };

        if self.state() != ConnectionState::Connecting {
            if let Ok(ws) = opened {
                debug!("discarding socket opened after disconnect");
                close_quietly(ws).await;
            }
            warn!(url = %self.config.api_url, "{}", INTERRUPTED_WHILE_CONNECTING);
            self.status.send_modify(|s| {
                s.state = ConnectionState::Disconnected;
                s.last_error = Some(INTERRUPTED_WHILE_CONNECTING.to_string());
            });
            return ConnectionState::Disconnected;
        }

        match opened {
            Ok(ws) => {
                *slot = Some(ws);
                self.status.send_modify(|s| {
                    s.state = ConnectionState::Connected;
                    s.last_error = None;
                });
                info!(url = %self.config.api_url, "connected");
                ConnectionState::Connected
            }
            Err(e) => {
                error!(url = %self.config.api_url, "connect failed: {}", e);
                self.status.send_modify(|s| {
                    s.state = ConnectionState::Disconnected;
                    s.last_error = Some(e.to_string());
                });
                ConnectionState::Disconnected
            }
        }
    }

    async fn open(&self) -> Result<WsStream> {
        let mut request = self.config.api_url.as_str().into_client_request()?;
        let auth = HeaderValue::from_str(&format!("{AUTH_SCHEME} {}", self.config.token))
            .map_err(|e| ClientError::Config(format!("token is not a valid header value: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        // tungstenite sends no keep-alive pings of its own, which is what the
        // endpoint expects: traffic is request/response only.
        let (ws, response) = tokio_tungstenite::connect_async(request).await?;
        debug!(status = %response.status(), "websocket handshake complete");
        Ok(ws)
    }
}

/// Exclusive use of the connection for one utterance.
///
/// Dropping an exchange before [`Exchange::finish`] or [`Exchange::discard`]
/// (for instance when the audio stream is dropped half way) throws the socket
/// away, so the next utterance cannot read this one's leftover frames.
pub struct Exchange<'a> {
    slot: MutexGuard<'a, Option<WsStream>>,
    status: &'a watch::Sender<ConnectionStatus>,
    settled: bool,
}

enum Inbound {
    Interrupted,
    Elapsed,
    Message(Option<std::result::Result<Message, tungstenite::Error>>),
}

impl Exchange<'_> {
    fn is_connected(&self) -> bool {
        self.status.borrow().state == ConnectionState::Connected
    }

    pub async fn send(&mut self, frame: Vec<u8>) -> Result<()> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let ws = self.slot.as_mut().ok_or(ClientError::NotConnected)?;
        if let Err(e) = ws.send(Message::Binary(frame)).await {
            self.sever();
            return Err(e.into());
        }
        Ok(())
    }

    /// Wait for the next binary message.
    ///
    /// Ends with `ConnectionClosed` if the connection is interrupted or the
    /// endpoint closes it, and with `Timeout` if nothing arrives within
    /// `limit`. Either way the socket is gone afterwards.
    pub async fn recv(&mut self, limit: Duration) -> Result<Vec<u8>> {
        let mut status = self.status.subscribe();
        loop {
            let inbound = {
                let ws = self.slot.as_mut().ok_or(ClientError::ConnectionClosed)?;
                tokio::select! {
                    biased;
                    _ = status.wait_for(|s| s.state != ConnectionState::Connected) => {
                        Inbound::Interrupted
                    }
                    next = tokio::time::timeout(limit, ws.next()) => match next {
                        Ok(message) => Inbound::Message(message),
                        Err(_) => Inbound::Elapsed,
                    },
                }
            };

            match inbound {
                Inbound::Interrupted => {
                    debug!("interrupted while awaiting a frame");
                    self.sever();
                    return Err(ClientError::ConnectionClosed);
                }
                Inbound::Elapsed => {
                    warn!(?limit, "endpoint went silent");
                    self.sever();
                    return Err(ClientError::Timeout(limit));
                }
                Inbound::Message(None) => {
                    self.sever();
                    return Err(ClientError::ConnectionClosed);
                }
                Inbound::Message(Some(Err(e))) => {
                    self.sever();
                    return Err(e.into());
                }
                Inbound::Message(Some(Ok(message))) => match message {
                    Message::Binary(data) => return Ok(data),
                    Message::Close(frame) => {
                        debug!(?frame, "endpoint closed the connection");
                        self.sever();
                        return Err(ClientError::ConnectionClosed);
                    }
                    Message::Text(text) => warn!(len = text.len(), "ignoring text message"),
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                },
            }
        }
    }

    /// Release the connection and keep it open for the next utterance.
    pub fn finish(mut self) {
        self.settled = true;
    }

    /// Close the connection; the next utterance reconnects.
    pub async fn discard(mut self) {
        if let Some(ws) = self.slot.take() {
            close_quietly(ws).await;
        }
        self.status
            .send_modify(|s| s.state = ConnectionState::Disconnected);
        self.settled = true;
    }

    fn sever(&mut self) {
        self.slot.take();
        self.status
            .send_modify(|s| s.state = ConnectionState::Disconnected);
        self.settled = true;
    }
}

impl Drop for Exchange<'_> {
    fn drop(&mut self) {
        if !self.settled && self.slot.take().is_some() {
            debug!("utterance abandoned mid-stream; dropping socket");
            self.status
                .send_modify(|s| s.state = ConnectionState::Disconnected);
        }
    }
}

async fn close_quietly(mut ws: WsStream) {
    match tokio::time::timeout(CLOSE_GRACE, ws.close(None)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("error closing websocket: {}", e),
        Err(_) => warn!("websocket close timed out"),
    }
}
