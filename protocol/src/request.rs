//! The full client request: one per synthesized utterance.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::compression;
use crate::error::{ProtocolError, Result};
use crate::header::{Compression, MessageType, Serialization, WireHeader, HEADER_SIZE};
use crate::reader::PayloadReader;

/// Anonymous user id sent with every request.
pub const DEFAULT_UID: &str = "388808087185088";

/// Application identity issued by the TTS console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub appid: String,
    pub token: String,
    #[serde(default = "default_cluster")]
    pub cluster: String,
}

impl AppIdentity {
    pub fn new(appid: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            appid: appid.into(),
            token: token.into(),
            cluster: default_cluster(),
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBlock {
    pub uid: String,
}

impl Default for UserBlock {
    fn default() -> Self {
        Self {
            uid: DEFAULT_UID.to_string(),
        }
    }
}

/// Voice configuration. Ratios are unit-scaled around 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default = "default_voice")]
    pub voice_type: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_ratio")]
    pub speed_ratio: f32,
    #[serde(default = "default_ratio")]
    pub volume_ratio: f32,
    #[serde(default = "default_ratio")]
    pub pitch_ratio: f32,
}

fn default_cluster() -> String {
    "volcano_tts".to_string()
}

fn default_voice() -> String {
    "zh_female_shuangkuaisisi_moon_bigtts".to_string()
}

fn default_encoding() -> String {
    "pcm".to_string()
}

fn default_ratio() -> f32 {
    1.0
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice_type: default_voice(),
            encoding: default_encoding(),
            speed_ratio: default_ratio(),
            volume_ratio: default_ratio(),
            pitch_ratio: default_ratio(),
        }
    }
}

impl VoiceSettings {
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice_type = voice.into();
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed_ratio = speed;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume_ratio = volume;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch_ratio = pitch;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextType {
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Synthesize now and stream the result; no further text follows.
    Submit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBlock {
    pub reqid: String,
    pub text: String,
    pub text_type: TextType,
    pub operation: Operation,
}

/// Outbound request document.
///
/// Built once per utterance with a fresh request id and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    app: AppIdentity,
    user: UserBlock,
    audio: VoiceSettings,
    request: RequestBlock,
}

impl RequestFrame {
    pub fn new(app: AppIdentity, audio: VoiceSettings, text: impl Into<String>) -> Self {
        Self {
            app,
            user: UserBlock::default(),
            audio,
            request: RequestBlock {
                reqid: Uuid::new_v4().to_string(),
                text: text.into(),
                text_type: TextType::Plain,
                operation: Operation::Submit,
            },
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.user.uid = uid.into();
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request.reqid
    }

    pub fn text(&self) -> &str {
        &self.request.text
    }

    pub fn app(&self) -> &AppIdentity {
        &self.app
    }

    pub fn user(&self) -> &UserBlock {
        &self.user
    }

    pub fn audio(&self) -> &VoiceSettings {
        &self.audio
    }

    pub fn request(&self) -> &RequestBlock {
        &self.request
    }

    /// Encode as `[header][u32 BE payload length][gzip(JSON)]`, ready to send
    /// as one binary message.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        let payload = compression::compress(&json)?;

        let header = WireHeader::new(
            MessageType::FullClientRequest,
            0,
            Serialization::Json,
            Compression::Gzip,
        );

        let mut frame = Vec::with_capacity(HEADER_SIZE + 4 + payload.len());
        frame.extend_from_slice(&header.encode());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode a full client request. This is the endpoint side of
    /// [`RequestFrame::encode`].
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let header = WireHeader::decode(frame)?;
        if header.kind() != Some(MessageType::FullClientRequest) {
            return Err(ProtocolError::UnexpectedMessageType(header.message_type));
        }
        if header.serialization != Serialization::Json as u8 {
            return Err(ProtocolError::UnsupportedSerialization(header.serialization));
        }
        if header.header_words > 1 {
            debug!(
                extension_len = header.header_len() - HEADER_SIZE,
                "skipping header extensions"
            );
        }

        let payload = PayloadReader::new(&frame[header.header_len()..]).sized_tail()?;
        let json = compression::unpack(payload, header.compression_method()?)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RequestFrame {
        RequestFrame::new(
            AppIdentity::new("app-1", "tok-1"),
            VoiceSettings::default(),
            "你好",
        )
    }

    #[test]
    fn test_encode_layout() {
        let frame = sample().encode().unwrap();

        assert_eq!(&frame[..4], &[0x11, 0x10, 0x11, 0x00]);
        let declared = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]) as usize;
        assert_eq!(declared, frame.len() - 8);
    }

    #[test]
    fn test_encode_document_fields() {
        let request = sample();
        let frame = request.encode().unwrap();
        let json = compression::decompress(&frame[8..]).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(doc["app"]["appid"], "app-1");
        assert_eq!(doc["app"]["token"], "tok-1");
        assert_eq!(doc["app"]["cluster"], "volcano_tts");
        assert_eq!(doc["user"]["uid"], DEFAULT_UID);
        assert_eq!(doc["audio"]["voice_type"], "zh_female_shuangkuaisisi_moon_bigtts");
        assert_eq!(doc["audio"]["encoding"], "pcm");
        assert_eq!(doc["audio"]["speed_ratio"], 1.0);
        assert_eq!(doc["audio"]["volume_ratio"], 1.0);
        assert_eq!(doc["audio"]["pitch_ratio"], 1.0);
        assert_eq!(doc["request"]["reqid"], request.request_id());
        assert_eq!(doc["request"]["text"], "你好");
        assert_eq!(doc["request"]["text_type"], "plain");
        assert_eq!(doc["request"]["operation"], "submit");
    }

    #[test]
    fn test_fresh_request_id_per_request() {
        assert_ne!(sample().request_id(), sample().request_id());
    }

    #[test]
    fn test_voice_overrides() {
        let voice = VoiceSettings::default()
            .with_voice("zh_male_test")
            .with_speed(1.25)
            .with_pitch(0.5);
        let request = RequestFrame::new(AppIdentity::new("a", "t"), voice, "x");

        assert_eq!(request.audio().voice_type, "zh_male_test");
        assert_eq!(request.audio().speed_ratio, 1.25);
        assert_eq!(request.audio().volume_ratio, 1.0);
        assert_eq!(request.audio().pitch_ratio, 0.5);
    }

    #[test]
    fn test_decode_matches_encode() {
        let request = sample().with_uid("42");
        let decoded = RequestFrame::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_decode_rejects_other_message_types() {
        let mut frame = sample().encode().unwrap();
        frame[1] = 0xB0;
        assert!(matches!(
            RequestFrame::decode(&frame),
            Err(ProtocolError::UnexpectedMessageType(0xB))
        ));
    }

    #[test]
    fn test_decode_truncated_payload() {
        let frame = sample().encode().unwrap();
        assert!(matches!(
            RequestFrame::decode(&frame[..frame.len() - 3]),
            Err(ProtocolError::Truncated { .. })
        ));
    }
}
