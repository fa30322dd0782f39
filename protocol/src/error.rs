//! Errors raised while encoding or decoding frames.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame ended before a field it declares.
    #[error("truncated frame: needed {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// A sized field declares fewer bytes than the frame carries.
    #[error("length mismatch: declared {declared} bytes, frame carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("invalid header length: {0} words")]
    InvalidHeaderLength(u8),

    #[error("unknown message type: {0:#x}")]
    UnknownMessageType(u8),

    /// A known message type arrived where another one was required.
    #[error("unexpected message type: {0:#x}")]
    UnexpectedMessageType(u8),

    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u8),

    #[error("unsupported serialization method: {0}")]
    UnsupportedSerialization(u8),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
