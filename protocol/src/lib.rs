//! Binary framing for the Doubao streaming TTS websocket API.
//!
//! Every message is a single binary websocket frame:
//! - Client sends: `[4-byte header][u32 BE length][gzip(JSON request)]`
//! - Server returns: `[4-byte header][header extensions][payload]`, where the
//!   payload is audio (`0xB`), frontend metadata (`0xC`) or an error (`0xF`)
//!
//! Audio responses carry a signed sequence number; the first negative one
//! ends the utterance.

mod compression;
mod error;
mod header;
mod reader;
mod request;
mod response;

pub use compression::{compress, decompress, decompress_bounded, MAX_DECOMPRESSED_BYTES};
pub use error::{ProtocolError, Result};
pub use header::{
    Compression, MessageType, Serialization, WireHeader, HEADER_SIZE, PROTOCOL_VERSION,
};
pub use request::{
    AppIdentity, Operation, RequestBlock, RequestFrame, TextType, UserBlock, VoiceSettings,
    DEFAULT_UID,
};
pub use response::{ResponseFrame, FLAG_SEQUENCE_NEGATIVE, FLAG_SEQUENCE_POSITIVE};

/// Audio format constants for `pcm` encoding
pub const SAMPLE_RATE: u32 = 24000;
pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;
