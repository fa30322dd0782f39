//! Local reference endpoint for the Doubao binary TTS protocol.
//!
//! Accepts full client requests and streams back a synthetic tone as
//! sequenced audio frames, so the client can be developed and tested without
//! network access or credentials.

pub mod tts;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

use doubao_protocol::{Compression, RequestFrame, ResponseFrame, SAMPLE_RATE};
use tts::ToneEngine;

/// Request could not be decoded.
pub const ERR_INVALID_REQUEST: u32 = 3001;
/// Request text is empty.
pub const ERR_INVALID_TEXT: u32 = 3011;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Required access token; `None` accepts any client.
    pub token: Option<String>,
    /// Audio per frame, in milliseconds
    pub chunk_ms: u32,
    pub sample_rate: u32,
    /// Send a frontend metadata frame before the audio
    pub send_metadata: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            token: None,
            chunk_ms: 100,
            sample_rate: SAMPLE_RATE,
            send_metadata: true,
        }
    }
}

/// Accept connections on `listener` until it fails.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> Result<()> {
    let config = Arc::new(config);
    let engine = Arc::new(ToneEngine::new(config.sample_rate));
    info!("TTS reference server listening on ws://{}", listener.local_addr()?);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let config = Arc::clone(&config);
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, config, engine).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
    engine: Arc<ToneEngine>,
) -> Result<()> {
    info!("New connection from: {}", peer_addr);

    let expected = config.token.as_ref().map(|token| format!("Bearer; {token}"));
    let authorize = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let Some(expected) = &expected else {
            return Ok(response);
        };
        let presented = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        if presented == Some(expected.as_str()) {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("invalid access token".to_string()));
            *rejection.status_mut() = StatusCode::UNAUTHORIZED;
            Err(rejection)
        }
    };

    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, authorize).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    while let Some(msg) = ws_receiver.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                warn!("WebSocket error from {}: {}", peer_addr, e);
                break;
            }
        };

        match msg {
            Message::Binary(data) => {
                let request = match RequestFrame::decode(&data) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("Invalid request from {}: {}", peer_addr, e);
                        let response = ResponseFrame::Error {
                            code: ERR_INVALID_REQUEST,
                            message: format!("invalid request: {e}"),
                        };
                        send_frame(&mut ws_sender, &response).await?;
                        continue;
                    }
                };

                if request.text().trim().is_empty() {
                    let response = ResponseFrame::Error {
                        code: ERR_INVALID_TEXT,
                        message: "text is empty".to_string(),
                    };
                    send_frame(&mut ws_sender, &response).await?;
                    continue;
                }

                stream_tone(&mut ws_sender, &request, &config, &engine).await?;
            }
            Message::Text(_) => {
                warn!("Received unexpected text message from {}", peer_addr);
            }
            Message::Ping(data) => {
                ws_sender.send(Message::Pong(data)).await?;
            }
            Message::Pong(_) => {}
            Message::Close(_) => {
                info!("Client {} disconnected", peer_addr);
                break;
            }
            Message::Frame(_) => {}
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

async fn stream_tone<S>(
    sender: &mut S,
    request: &RequestFrame,
    config: &ServerConfig,
    engine: &ToneEngine,
) -> Result<()>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    info!(
        request_id = request.request_id(),
        voice = %request.audio().voice_type,
        "Synthesizing {} chars",
        request.text().chars().count()
    );

    if config.send_metadata {
        let metadata = serde_json::json!({
            "reqid": request.request_id(),
            "text": request.text(),
        });
        let response = ResponseFrame::FrontendMetadata {
            payload: Bytes::from(serde_json::to_vec(&metadata)?),
        };
        send_frame(sender, &response).await?;
    }

    let pcm = engine.synthesize(request.text(), request.audio().speed_ratio);
    let pieces: Vec<&[u8]> = pcm.chunks(engine.chunk_bytes(config.chunk_ms)).collect();
    let total = pieces.len() as i32;

    for (i, piece) in pieces.into_iter().enumerate() {
        let index = i as i32 + 1;
        let sequence_number = if index == total { -index } else { index };
        let response = ResponseFrame::AudioChunk {
            sequence_number,
            payload: Bytes::copy_from_slice(piece),
        };
        send_frame(sender, &response).await?;
    }

    debug!(request_id = request.request_id(), frames = total, "Audio sent");
    Ok(())
}

async fn send_frame<S>(sender: &mut S, frame: &ResponseFrame) -> Result<()>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let bytes = frame.encode(Compression::Gzip)?;
    sender.send(Message::Binary(bytes)).await?;
    Ok(())
}
