//! Client configuration

use std::time::Duration;

use doubao_protocol::{AppIdentity, VoiceSettings, CHANNELS, DEFAULT_UID, SAMPLE_RATE};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Connection and voice settings for [`crate::TtsService`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Websocket endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    pub appid: String,

    /// Access token, sent both in the handshake and in every request
    pub token: String,

    #[serde(default = "default_cluster")]
    pub cluster: String,

    #[serde(default)]
    pub voice: VoiceSettings,

    #[serde(default = "default_uid")]
    pub uid: String,

    /// Sample rate agreed out of band for `pcm` audio
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Maximum wait for any single inbound frame
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Extra connect attempts after the first failure
    #[serde(default)]
    pub connect_retries: u32,

    /// Delay before the first retry; doubled on each further attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_api_url() -> String {
    "wss://openspeech.bytedance.com/api/v1/tts/ws_binary".to_string()
}

fn default_cluster() -> String {
    "volcano_tts".to_string()
}

fn default_uid() -> String {
    DEFAULT_UID.to_string()
}

fn default_sample_rate() -> u32 {
    SAMPLE_RATE
}

fn default_channels() -> u16 {
    CHANNELS
}

fn default_read_timeout_ms() -> u64 {
    10_000
}

fn default_retry_backoff_ms() -> u64 {
    250
}

impl ClientConfig {
    pub fn new(appid: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: default_api_url(),
            appid: appid.into(),
            token: token.into(),
            cluster: default_cluster(),
            voice: VoiceSettings::default(),
            uid: default_uid(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            read_timeout_ms: default_read_timeout_ms(),
            connect_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }

    /// Build from `DOUBAO_APPID` and `DOUBAO_TOKEN`, with optional
    /// `DOUBAO_URL`, `DOUBAO_CLUSTER` and `DOUBAO_VOICE` overrides.
    pub fn from_env() -> Result<Self> {
        let required = |name: &str| {
            std::env::var(name).map_err(|_| ClientError::Config(format!("{name} is not set")))
        };

        let mut config = Self::new(required("DOUBAO_APPID")?, required("DOUBAO_TOKEN")?);
        if let Ok(url) = std::env::var("DOUBAO_URL") {
            config.api_url = url;
        }
        if let Ok(cluster) = std::env::var("DOUBAO_CLUSTER") {
            config.cluster = cluster;
        }
        if let Ok(voice) = std::env::var("DOUBAO_VOICE") {
            config.voice.voice_type = voice;
        }
        Ok(config)
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    pub fn with_voice(mut self, voice: VoiceSettings) -> Self {
        self.voice = voice;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_connect_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.connect_retries = retries;
        self.retry_backoff_ms = backoff.as_millis() as u64;
        self
    }

    pub fn app_identity(&self) -> AppIdentity {
        AppIdentity::new(&self.appid, &self.token).with_cluster(&self.cluster)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}
