//! Gzip helpers for compressed payloads.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::{ProtocolError, Result};
use crate::header::Compression;

/// Upper bound on an inflated payload. Error text and metadata stay far below it.
pub const MAX_DECOMPRESSED_BYTES: u64 = 4 * 1024 * 1024;

pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(data.len()),
        flate2::Compression::default(),
    );
    encoder
        .write_all(data)
        .map_err(|e| ProtocolError::Compression(format!("gzip write failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| ProtocolError::Compression(format!("gzip finish failed: {e}")))
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_bounded(data, MAX_DECOMPRESSED_BYTES)
}

/// Inflate `data`, failing once the output would exceed `limit` bytes.
pub fn decompress_bounded(data: &[u8], limit: u64) -> Result<Vec<u8>> {
    // One byte past the limit tells an exact fit from an overflow.
    let mut decoder = GzDecoder::new(data).take(limit.saturating_add(1));
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| ProtocolError::Compression(format!("gzip decompress failed: {e}")))?;
    if decompressed.len() as u64 > limit {
        return Err(ProtocolError::Compression(format!(
            "decompressed payload exceeds {limit} bytes"
        )));
    }
    Ok(decompressed)
}

/// Apply `method` to an outbound payload.
pub(crate) fn pack(data: &[u8], method: Compression) -> Result<Vec<u8>> {
    match method {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => compress(data),
    }
}

/// Undo `method` on an inbound payload.
pub(crate) fn unpack(data: &[u8], method: Compression) -> Result<Vec<u8>> {
    match method {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => decompress(data),
    }
}
