//! Error types for the TTS client

use std::time::Duration;

use doubao_protocol::ProtocolError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Socket open or handshake failed. The connection is left `Disconnected`.
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("not connected")]
    NotConnected,

    /// The socket was closed underneath an utterance, by the endpoint or by
    /// an interruption.
    #[error("connection closed")]
    ConnectionClosed,

    #[error("no frame received within {0:?}")]
    Timeout(Duration),

    #[error("remote error {code}: {message}")]
    Remote { code: u32, message: String },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
