//! Streaming TTS service: one request frame in, a lazy stream of audio out.

use std::sync::Arc;
use std::time::Instant;

use async_stream::try_stream;
use doubao_protocol::{RequestFrame, ResponseFrame};
use futures_util::Stream;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::{ClientError, Result};
use crate::metrics::{LatencyObserver, NoopObserver};
use crate::session::{AudioChunk, Session, Step, Transition};

pub struct TtsService {
    config: Arc<ClientConfig>,
    connection: ConnectionManager,
    observer: Arc<dyn LatencyObserver>,
}

impl TtsService {
    pub fn new(config: ClientConfig) -> Self {
        let config = Arc::new(config);
        Self {
            connection: ConnectionManager::new(Arc::clone(&config)),
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LatencyObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Open the connection ahead of the first utterance.
    pub async fn start(&self) -> ConnectionState {
        self.connection.connect().await
    }

    pub async fn stop(&self) {
        self.connection.disconnect().await
    }

    /// Barge-in: drop the connection at once. An utterance in progress ends
    /// with [`ClientError::ConnectionClosed`]; the next one reconnects.
    pub async fn handle_interruption(&self) {
        info!("interruption; cutting synthesis short");
        self.connection.disconnect().await
    }

    /// Build the request document for one utterance.
    pub fn request_for(&self, text: impl Into<String>) -> RequestFrame {
        RequestFrame::new(
            self.config.app_identity(),
            self.config.voice.clone(),
            text,
        )
        .with_uid(&self.config.uid)
    }

    /// Synthesize `text`, yielding audio chunks in arrival order as soon as
    /// each one is decoded.
    ///
    /// The stream ends after the final chunk. Any failure is yielded as the
    /// last item instead of being raised. Whitespace-only text produces an
    /// empty stream without touching the connection.
    pub fn synthesize(&self, text: &str) -> impl Stream<Item = Result<AudioChunk>> + '_ {
        let text = text.to_owned();
        try_stream! {
            if text.trim().is_empty() {
                debug!("empty utterance; nothing to synthesize");
                return;
            }

            let request = self.request_for(text);
            let frame = request.encode()?;
            let mut session = Session::new(
                request.request_id(),
                self.config.sample_rate,
                self.config.channels,
            );
            debug!(
                request_id = %session.request_id(),
                chars = request.text().chars().count(),
                "synthesizing"
            );

            let mut exchange = self.connection.acquire().await?;
            self.observer.request_submitted(session.request_id());
            let submitted_at = Instant::now();
            exchange.send(frame).await?;

            loop {
                let raw = exchange
                    .recv(self.config.read_timeout())
                    .await
                    .inspect_err(|e| {
                        warn!(request_id = %session.request_id(), "utterance aborted: {}", e)
                    })?;

                let Transition { audio, step } = session.advance(ResponseFrame::decode(&raw));
                if let Some(chunk) = audio {
                    if session.is_first_chunk() {
                        self.observer
                            .first_audio(session.request_id(), submitted_at.elapsed());
                    }
                    yield chunk;
                }

                match step {
                    Step::Continue => {}
                    Step::Complete => {
                        debug!(
                            request_id = %session.request_id(),
                            chunks = session.chunks_emitted(),
                            "utterance complete"
                        );
                        exchange.finish();
                        break;
                    }
                    Step::Fail(err) => {
                        // The endpoint considers the request abandoned after an
                        // error frame; reconnect rather than risk stale frames.
                        if matches!(err, ClientError::Remote { .. }) {
                            exchange.discard().await;
                        } else {
                            exchange.finish();
                        }
                        Err::<(), ClientError>(err)?;
                        break;
                    }
                }
            }
        }
    }
}
