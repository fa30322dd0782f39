//! Per-utterance response state machine.
//!
//! [`Session::advance`] classifies one decoded frame and never touches I/O;
//! the receive loop in [`crate::TtsService`] acts on the result.

use bytes::Bytes;
use doubao_protocol::{ProtocolError, ResponseFrame};
use tracing::{debug, warn};

use crate::error::ClientError;

/// Decoded audio handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Raw PCM samples.
    pub data: Bytes,
    /// Negative on the final chunk of an utterance.
    pub sequence_number: i32,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioChunk {
    pub fn is_final(&self) -> bool {
        self.sequence_number < 0
    }
}

/// What the receive loop does next.
#[derive(Debug)]
pub enum Step {
    /// More frames are expected.
    Continue,
    /// The utterance ended normally.
    Complete,
    /// The utterance ended with an error.
    Fail(ClientError),
}

/// Result of feeding one frame to a [`Session`].
#[derive(Debug)]
pub struct Transition {
    /// Audio to forward before acting on `step`.
    pub audio: Option<AudioChunk>,
    pub step: Step,
}

impl Transition {
    fn step(step: Step) -> Self {
        Self { audio: None, step }
    }
}

pub struct Session {
    request_id: String,
    sample_rate: u32,
    channels: u16,
    chunks_emitted: usize,
    last_sequence: Option<i32>,
}

impl Session {
    pub fn new(request_id: impl Into<String>, sample_rate: u32, channels: u16) -> Self {
        Self {
            request_id: request_id.into(),
            sample_rate,
            channels,
            chunks_emitted: 0,
            last_sequence: None,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn chunks_emitted(&self) -> usize {
        self.chunks_emitted
    }

    pub fn last_sequence(&self) -> Option<i32> {
        self.last_sequence
    }

    /// True right after the first audio chunk of the utterance was produced.
    pub fn is_first_chunk(&self) -> bool {
        self.chunks_emitted == 1
    }

    pub fn advance(&mut self, decoded: Result<ResponseFrame, ProtocolError>) -> Transition {
        let frame = match decoded {
            Ok(frame) => frame,
            Err(e) => {
                warn!(request_id = %self.request_id, "undecodable frame: {}", e);
                return Transition::step(Step::Fail(e.into()));
            }
        };

        match frame {
            ResponseFrame::AudioChunk {
                sequence_number,
                payload,
            } => {
                self.chunks_emitted += 1;
                self.last_sequence = Some(sequence_number);
                debug!(
                    request_id = %self.request_id,
                    sequence_number,
                    bytes = payload.len(),
                    "audio chunk"
                );

                let step = if sequence_number < 0 {
                    Step::Complete
                } else {
                    Step::Continue
                };
                Transition {
                    audio: Some(AudioChunk {
                        data: payload,
                        sequence_number,
                        sample_rate: self.sample_rate,
                        channels: self.channels,
                    }),
                    step,
                }
            }
            ResponseFrame::AckOnly => {
                debug!(request_id = %self.request_id, "bare acknowledgement");
                Transition::step(Step::Complete)
            }
            ResponseFrame::Error { code, message } => {
                warn!(request_id = %self.request_id, code, "endpoint error: {}", message);
                Transition::step(Step::Fail(ClientError::Remote { code, message }))
            }
            ResponseFrame::FrontendMetadata { payload } => {
                debug!(
                    request_id = %self.request_id,
                    metadata = %String::from_utf8_lossy(&payload),
                    "frontend metadata"
                );
                Transition::step(Step::Continue)
            }
        }
    }
}
