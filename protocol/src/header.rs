//! The 4-byte header that leads every frame.
//!
//! ```text
//! byte 0: version (4 bits)       | header length in 4-byte words (4 bits)
//! byte 1: message type (4 bits)  | message-type-specific flags (4 bits)
//! byte 2: serialization (4 bits) | compression (4 bits)
//! byte 3: reserved
//! ```
//!
//! Bytes `[4, header_len)` are header extensions. They are opaque in this
//! protocol version.

use crate::error::{ProtocolError, Result};

/// Size of the mandatory header in bytes.
pub const HEADER_SIZE: usize = 4;

/// Protocol version sent in every outbound frame.
pub const PROTOCOL_VERSION: u8 = 0b0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Client request carrying the full synthesis document.
    FullClientRequest = 0x1,
    /// Server response carrying audio, or a bare acknowledgement.
    AudioOnlyResponse = 0xB,
    /// Server response carrying frontend metadata.
    FrontendMetadata = 0xC,
    /// Server error response.
    Error = 0xF,
}

impl MessageType {
    pub fn from_nibble(value: u8) -> Option<Self> {
        match value {
            0x1 => Some(Self::FullClientRequest),
            0xB => Some(Self::AudioOnlyResponse),
            0xC => Some(Self::FrontendMetadata),
            0xF => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Serialization {
    None = 0,
    Json = 1,
}

impl Serialization {
    pub fn from_nibble(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    Gzip = 1,
}

impl Compression {
    pub fn from_nibble(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Gzip),
            _ => None,
        }
    }
}

/// Decoded header fields.
///
/// Fields are kept as raw nibbles so that a frame with an unknown message
/// type still decodes far enough to be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireHeader {
    pub version: u8,
    pub header_words: u8,
    pub message_type: u8,
    pub flags: u8,
    pub serialization: u8,
    pub compression: u8,
    pub reserved: u8,
}

impl WireHeader {
    /// Create a single-word header with the current protocol version.
    pub fn new(
        message_type: MessageType,
        flags: u8,
        serialization: Serialization,
        compression: Compression,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            header_words: 1,
            message_type: message_type as u8,
            flags,
            serialization: serialization as u8,
            compression: compression as u8,
            reserved: 0,
        }
    }

    /// Pack the header into its 4-byte wire form. Each field is masked to its
    /// nibble.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        [
            ((self.version & 0x0F) << 4) | (self.header_words & 0x0F),
            ((self.message_type & 0x0F) << 4) | (self.flags & 0x0F),
            ((self.serialization & 0x0F) << 4) | (self.compression & 0x0F),
            self.reserved,
        ]
    }

    /// Parse the header at the start of `frame` and check that the frame is
    /// long enough to hold the header length it declares.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        if frame.len() < HEADER_SIZE {
            return Err(ProtocolError::Truncated {
                needed: HEADER_SIZE,
                available: frame.len(),
            });
        }

        let header = Self {
            version: frame[0] >> 4,
            header_words: frame[0] & 0x0F,
            message_type: frame[1] >> 4,
            flags: frame[1] & 0x0F,
            serialization: frame[2] >> 4,
            compression: frame[2] & 0x0F,
            reserved: frame[3],
        };

        if header.header_words == 0 {
            return Err(ProtocolError::InvalidHeaderLength(0));
        }
        if header.header_len() > frame.len() {
            return Err(ProtocolError::Truncated {
                needed: header.header_len(),
                available: frame.len(),
            });
        }

        Ok(header)
    }

    /// Header length in bytes, extensions included.
    #[inline]
    pub fn header_len(&self) -> usize {
        self.header_words as usize * 4
    }

    #[inline]
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::from_nibble(self.message_type)
    }

    pub fn compression_method(&self) -> Result<Compression> {
        Compression::from_nibble(self.compression)
            .ok_or(ProtocolError::UnsupportedCompression(self.compression))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_client_request_header_bytes() {
        let header = WireHeader::new(
            MessageType::FullClientRequest,
            0,
            Serialization::Json,
            Compression::Gzip,
        );
        assert_eq!(header.encode(), [0x11, 0x10, 0x11, 0x00]);
    }

    #[test]
    fn test_header_roundtrip_all_lengths() {
        for header_words in 1u8..=15 {
            for (message_type, flags) in [(0x1, 0x0), (0xB, 0x3), (0xC, 0x0), (0xF, 0xF)] {
                let header = WireHeader {
                    version: 1,
                    header_words,
                    message_type,
                    flags,
                    serialization: 1,
                    compression: 1,
                    reserved: 0,
                };
                let mut frame = header.encode().to_vec();
                frame.resize(header.header_len(), 0);

                assert_eq!(WireHeader::decode(&frame).unwrap(), header);
            }
        }
    }

    #[test]
    fn test_decode_short_buffer() {
        let err = WireHeader::decode(&[0x11, 0xB1]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated {
                needed: 4,
                available: 2
            }
        ));
    }

    #[test]
    fn test_decode_declared_length_exceeds_frame() {
        // Three header words declared, only one present.
        let err = WireHeader::decode(&[0x13, 0xB1, 0x00, 0x00, 0xAA]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated {
                needed: 12,
                available: 5
            }
        ));
    }

    #[test]
    fn test_decode_zero_header_words() {
        let err = WireHeader::decode(&[0x10, 0xB1, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidHeaderLength(0)));
    }

    #[test]
    fn test_unknown_nibbles() {
        assert_eq!(MessageType::from_nibble(0x3), None);
        assert_eq!(Compression::from_nibble(0x7), None);
        assert_eq!(Serialization::from_nibble(0x2), None);
    }
}
