//! Scripted websocket endpoint for client tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use doubao_client::ClientConfig;
use doubao_protocol::{Compression, RequestFrame, ResponseFrame};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;

/// Replies the endpoint sends for one request, in order. Once a script runs
/// out the endpoint goes quiet until the next request.
pub type Script = Vec<Vec<u8>>;

#[derive(Default)]
struct Shared {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<RequestFrame>>,
    auth_headers: Mutex<Vec<String>>,
    connections: AtomicUsize,
}

pub struct ScriptedEndpoint {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl ScriptedEndpoint {
    /// Start an endpoint that answers the n-th request with `scripts[n]`.
    pub async fn start(scripts: Vec<Script>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared {
            scripts: Mutex::new(scripts.into()),
            ..Shared::default()
        });

        let accepting = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let shared = Arc::clone(&accepting);
                tokio::spawn(async move {
                    let capture = Arc::clone(&shared);
                    let callback = move |request: &Request, response: Response| {
                        if let Some(value) = request.headers().get(AUTHORIZATION) {
                            let value = value.to_str().unwrap_or_default().to_string();
                            capture.auth_headers.lock().unwrap().push(value);
                        }
                        Ok::<_, ErrorResponse>(response)
                    };
                    let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                        return;
                    };
                    shared.connections.fetch_add(1, Ordering::SeqCst);

                    let (mut tx, mut rx) = ws.split();
                    while let Some(Ok(message)) = rx.next().await {
                        let Message::Binary(data) = message else {
                            continue;
                        };
                        let request = RequestFrame::decode(&data).unwrap();
                        shared.requests.lock().unwrap().push(request);

                        let script = shared.scripts.lock().unwrap().pop_front().unwrap_or_default();
                        for frame in script {
                            if tx.send(Message::Binary(frame)).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });

        Self { addr, shared }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new("test-app", "test-token").with_api_url(self.url())
    }

    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RequestFrame> {
        self.shared.requests.lock().unwrap().clone()
    }

    pub fn auth_headers(&self) -> Vec<String> {
        self.shared.auth_headers.lock().unwrap().clone()
    }
}

/// URL of a port nothing listens on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}")
}

/// URL of an endpoint that completes each websocket handshake only after
/// `delay`, then holds the connection open without replying.
pub async fn slow_handshake_url(delay: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });
    format!("ws://{addr}")
}

pub fn audio(sequence_number: i32, pcm: &'static [u8]) -> Vec<u8> {
    ResponseFrame::AudioChunk {
        sequence_number,
        payload: Bytes::from_static(pcm),
    }
    .encode(Compression::Gzip)
    .unwrap()
}

pub fn ack() -> Vec<u8> {
    ResponseFrame::AckOnly.encode(Compression::Gzip).unwrap()
}

pub fn error(code: u32, message: &str) -> Vec<u8> {
    ResponseFrame::Error {
        code,
        message: message.to_string(),
    }
    .encode(Compression::Gzip)
    .unwrap()
}

pub fn metadata(json: &'static str) -> Vec<u8> {
    ResponseFrame::FrontendMetadata {
        payload: Bytes::from_static(json.as_bytes()),
    }
    .encode(Compression::Gzip)
    .unwrap()
}
