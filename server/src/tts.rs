//! Synthetic speech: a sine tone whose length follows the text.

use std::f32::consts::PI;

const TONE_HZ: f32 = 220.0;
const AMPLITUDE: f32 = 0.3;
const MS_PER_CHAR: f32 = 80.0;
/// Speed ratios the endpoint accepts; anything else is clamped.
const MIN_SPEED: f32 = 0.2;
const MAX_SPEED: f32 = 3.0;

pub struct ToneEngine {
    sample_rate: u32,
}

impl ToneEngine {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Render `text` as 16-bit little-endian mono PCM.
    pub fn synthesize(&self, text: &str, speed: f32) -> Vec<u8> {
        let chars = text.chars().filter(|c| !c.is_whitespace()).count().max(1);
        let speed = if speed.is_finite() && speed > 0.0 {
            speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            1.0
        };
        let duration_ms = (chars as f32 * MS_PER_CHAR / speed).round() as usize;
        let num_samples = duration_ms * self.sample_rate as usize / 1000;

        let mut pcm = Vec::with_capacity(num_samples * 2);
        for i in 0..num_samples {
            let time = i as f32 / self.sample_rate as f32;
            let sample = (2.0 * PI * TONE_HZ * time).sin() * AMPLITUDE;
            let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
            pcm.extend_from_slice(&value.to_le_bytes());
        }
        pcm
    }

    /// Bytes of PCM covering `chunk_ms` milliseconds.
    pub fn chunk_bytes(&self, chunk_ms: u32) -> usize {
        ((self.sample_rate as usize * chunk_ms as usize) / 1000).max(1) * 2
    }
}
