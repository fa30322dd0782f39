//! Latency hooks for an external metrics collector.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Receives time-to-first-byte events for each utterance.
pub trait LatencyObserver: Send + Sync {
    /// The request frame is about to be sent.
    fn request_submitted(&self, _request_id: &str) {}

    /// The first audio chunk of the utterance was decoded.
    fn first_audio(&self, _request_id: &str, _ttfb: Duration) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LatencyObserver for NoopObserver {}

/// Keeps the most recent TTFB and a count of submitted requests.
#[derive(Debug, Default)]
pub struct TtfbRecorder {
    submitted: AtomicUsize,
    measured: AtomicUsize,
    last_ttfb_us: AtomicU64,
}

impl TtfbRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Number of utterances that produced audio.
    pub fn measured(&self) -> usize {
        self.measured.load(Ordering::Relaxed)
    }

    pub fn last_ttfb(&self) -> Option<Duration> {
        if self.measured() == 0 {
            return None;
        }
        Some(Duration::from_micros(self.last_ttfb_us.load(Ordering::Relaxed)))
    }
}

impl LatencyObserver for TtfbRecorder {
    fn request_submitted(&self, _request_id: &str) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    fn first_audio(&self, _request_id: &str, ttfb: Duration) {
        self.last_ttfb_us
            .store(ttfb.as_micros() as u64, Ordering::Relaxed);
        self.measured.fetch_add(1, Ordering::Relaxed);
    }
}
