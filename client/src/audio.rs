//! WAV output for received PCM chunks

use std::path::Path;

use anyhow::{bail, Result};
use doubao_client::AudioChunk;
use doubao_protocol::BITS_PER_SAMPLE;
use hound::{SampleFormat, WavSpec, WavWriter};

/// Write 16-bit little-endian PCM chunks to a WAV file.
///
/// Returns the duration written, in seconds.
pub fn save_pcm_chunks(path: &Path, chunks: &[AudioChunk]) -> Result<f32> {
    let Some(first) = chunks.first() else {
        bail!("no audio to save");
    };

    let spec = WavSpec {
        channels: first.channels,
        sample_rate: first.sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let mut samples = 0usize;
    for chunk in chunks {
        for pair in chunk.data.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
            samples += 1;
        }
    }
    writer.finalize()?;

    Ok(samples as f32 / (spec.sample_rate as f32 * spec.channels as f32))
}
