//! Frames sent by the endpoint.

use bytes::Bytes;
use tracing::debug;

use crate::compression;
use crate::error::{ProtocolError, Result};
use crate::header::{Compression, MessageType, Serialization, WireHeader, HEADER_SIZE};
use crate::reader::PayloadReader;

/// Audio flag for a chunk with a positive sequence number.
pub const FLAG_SEQUENCE_POSITIVE: u8 = 0b0001;
/// Audio flag for the final chunk, which carries a negative sequence number.
pub const FLAG_SEQUENCE_NEGATIVE: u8 = 0b0011;

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFrame {
    /// Raw audio samples. A negative sequence number marks the final chunk.
    AudioChunk { sequence_number: i32, payload: Bytes },
    /// Bare acknowledgement with no sequence number and no payload.
    AckOnly,
    /// Error reported by the endpoint.
    Error { code: u32, message: String },
    /// Informational metadata (JSON), never audio.
    FrontendMetadata { payload: Bytes },
}

impl ResponseFrame {
    /// Decode one inbound frame.
    ///
    /// Never indexes past the end of `frame`; short input fails with
    /// [`ProtocolError::Truncated`].
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let header = WireHeader::decode(frame)?;
        if header.header_len() > HEADER_SIZE {
            debug!(
                extensions = ?&frame[HEADER_SIZE..header.header_len()],
                "header extensions present"
            );
        }

        let mut payload = PayloadReader::new(&frame[header.header_len()..]);
        match header.kind() {
            Some(MessageType::AudioOnlyResponse) if header.flags == 0 => Ok(Self::AckOnly),
            Some(MessageType::AudioOnlyResponse) => {
                let sequence_number = payload.i32()?;
                let audio = payload.sized_tail()?;
                Ok(Self::AudioChunk {
                    sequence_number,
                    payload: Bytes::copy_from_slice(audio),
                })
            }
            Some(MessageType::Error) => {
                let code = payload.u32()?;
                let raw = payload.sized_tail()?;
                let text = compression::unpack(raw, header.compression_method()?)?;
                Ok(Self::Error {
                    code,
                    message: String::from_utf8_lossy(&text).into_owned(),
                })
            }
            Some(MessageType::FrontendMetadata) => {
                let raw = payload.sized_tail()?;
                let metadata = compression::unpack(raw, header.compression_method()?)?;
                Ok(Self::FrontendMetadata {
                    payload: Bytes::from(metadata),
                })
            }
            Some(MessageType::FullClientRequest) | None => {
                Err(ProtocolError::UnknownMessageType(header.message_type))
            }
        }
    }

    /// Encode as the endpoint would send it. `compression` applies to error
    /// text and metadata; audio is always sent raw.
    pub fn encode(&self, compression: Compression) -> Result<Vec<u8>> {
        let (header, body) = match self {
            Self::AckOnly => (
                WireHeader::new(
                    MessageType::AudioOnlyResponse,
                    0,
                    Serialization::None,
                    Compression::None,
                ),
                Vec::new(),
            ),
            Self::AudioChunk {
                sequence_number,
                payload,
            } => {
                let flags = if *sequence_number < 0 {
                    FLAG_SEQUENCE_NEGATIVE
                } else {
                    FLAG_SEQUENCE_POSITIVE
                };
                let mut body = Vec::with_capacity(8 + payload.len());
                body.extend_from_slice(&sequence_number.to_be_bytes());
                body.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                body.extend_from_slice(payload);
                (
                    WireHeader::new(
                        MessageType::AudioOnlyResponse,
                        flags,
                        Serialization::None,
                        Compression::None,
                    ),
                    body,
                )
            }
            Self::Error { code, message } => {
                let text = compression::pack(message.as_bytes(), compression)?;
                let mut body = Vec::with_capacity(8 + text.len());
                body.extend_from_slice(&code.to_be_bytes());
                body.extend_from_slice(&(text.len() as u32).to_be_bytes());
                body.extend_from_slice(&text);
                (
                    WireHeader::new(MessageType::Error, 0, Serialization::Json, compression),
                    body,
                )
            }
            Self::FrontendMetadata { payload } => {
                let packed = compression::pack(payload, compression)?;
                let mut body = Vec::with_capacity(4 + packed.len());
                body.extend_from_slice(&(packed.len() as u32).to_be_bytes());
                body.extend_from_slice(&packed);
                (
                    WireHeader::new(
                        MessageType::FrontendMetadata,
                        0,
                        Serialization::Json,
                        compression,
                    ),
                    body,
                )
            }
        };

        let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
        frame.extend_from_slice(&header.encode());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// True for an audio chunk that ends the utterance.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::AudioChunk { sequence_number, .. } if *sequence_number < 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_frame(sequence_number: i32, samples: &[u8]) -> Vec<u8> {
        ResponseFrame::AudioChunk {
            sequence_number,
            payload: Bytes::copy_from_slice(samples),
        }
        .encode(Compression::None)
        .unwrap()
    }

    #[test]
    fn test_decode_audio_chunk() {
        let frame = audio_frame(3, &[1, 2, 3, 4]);
        assert_eq!(frame[1], 0xB1);

        let decoded = ResponseFrame::decode(&frame).unwrap();
        assert_eq!(
            decoded,
            ResponseFrame::AudioChunk {
                sequence_number: 3,
                payload: Bytes::from_static(&[1, 2, 3, 4]),
            }
        );
        assert!(!decoded.is_final());
    }

    #[test]
    fn test_decode_final_chunk() {
        let frame = audio_frame(-4, &[9, 9]);
        assert_eq!(frame[1], 0xB3);
        assert!(ResponseFrame::decode(&frame).unwrap().is_final());
    }

    #[test]
    fn test_decode_ack() {
        assert_eq!(
            ResponseFrame::decode(&[0x11, 0xB0, 0x00, 0x00]).unwrap(),
            ResponseFrame::AckOnly
        );
    }

    #[test]
    fn test_decode_gzip_error() {
        let frame = ResponseFrame::Error {
            code: 4001,
            message: "bad request".to_string(),
        }
        .encode(Compression::Gzip)
        .unwrap();
        assert_eq!(frame[2], 0x11);

        match ResponseFrame::decode(&frame).unwrap() {
            ResponseFrame::Error { code, message } => {
                assert_eq!(code, 4001);
                assert_eq!(message, "bad request");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_decode_plain_error() {
        let mut frame = vec![0x11, 0xF0, 0x10, 0x00];
        frame.extend_from_slice(&3050u32.to_be_bytes());
        frame.extend_from_slice(&4u32.to_be_bytes());
        frame.extend_from_slice(b"oops");

        assert_eq!(
            ResponseFrame::decode(&frame).unwrap(),
            ResponseFrame::Error {
                code: 3050,
                message: "oops".to_string()
            }
        );
    }

    #[test]
    fn test_decode_metadata() {
        let json = br#"{"phonemes":"ni3 hao3"}"#;
        for compression in [Compression::None, Compression::Gzip] {
            let frame = ResponseFrame::FrontendMetadata {
                payload: Bytes::from_static(json),
            }
            .encode(compression)
            .unwrap();

            assert_eq!(
                ResponseFrame::decode(&frame).unwrap(),
                ResponseFrame::FrontendMetadata {
                    payload: Bytes::from_static(json)
                }
            );
        }
    }

    #[test]
    fn test_decode_skips_header_extensions() {
        let plain = audio_frame(1, &[5, 6]);
        let mut frame = vec![0x12, plain[1], plain[2], plain[3], 0xDE, 0xAD, 0xBE, 0xEF];
        frame.extend_from_slice(&plain[4..]);

        assert_eq!(
            ResponseFrame::decode(&frame).unwrap(),
            ResponseFrame::AudioChunk {
                sequence_number: 1,
                payload: Bytes::from_static(&[5, 6]),
            }
        );
    }

    #[test]
    fn test_unknown_message_type() {
        let err = ResponseFrame::decode(&[0x11, 0x30, 0x00, 0x00, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessageType(0x3)));
    }

    #[test]
    fn test_client_request_type_is_not_a_response() {
        let err = ResponseFrame::decode(&[0x11, 0x10, 0x11, 0x00]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessageType(0x1)));
    }

    #[test]
    fn test_truncated_frames_never_panic() {
        let full = audio_frame(7, &[1, 2, 3, 4, 5, 6, 7, 8]);
        for len in 0..full.len() {
            let err = ResponseFrame::decode(&full[..len]).unwrap_err();
            assert!(
                matches!(err, ProtocolError::Truncated { .. }),
                "len {len}: {err:?}"
            );
        }
    }

    #[test]
    fn test_audio_length_mismatch() {
        let mut frame = audio_frame(1, &[1, 2]);
        frame.push(3);
        assert!(matches!(
            ResponseFrame::decode(&frame),
            Err(ProtocolError::LengthMismatch {
                declared: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_corrupt_gzip_is_protocol_error() {
        let mut frame = vec![0x11, 0xC0, 0x11, 0x00];
        frame.extend_from_slice(&3u32.to_be_bytes());
        frame.extend_from_slice(b"xyz");
        assert!(matches!(
            ResponseFrame::decode(&frame),
            Err(ProtocolError::Compression(_))
        ));
    }

    #[test]
    fn test_unsupported_compression() {
        let mut frame = vec![0x11, 0xC0, 0x17, 0x00];
        frame.extend_from_slice(&1u32.to_be_bytes());
        frame.push(b'x');
        assert!(matches!(
            ResponseFrame::decode(&frame),
            Err(ProtocolError::UnsupportedCompression(7))
        ));
    }
}
