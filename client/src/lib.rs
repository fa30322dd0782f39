//! Streaming client for the Doubao binary TTS websocket API.
//!
//! ```ignore
//! use doubao_client::{ClientConfig, TtsService};
//! use futures_util::StreamExt;
//!
//! let service = TtsService::new(ClientConfig::from_env()?);
//! let stream = service.synthesize("你好，世界");
//! futures_util::pin_mut!(stream);
//! while let Some(chunk) = stream.next().await {
//!     sink.write(&chunk?.data);
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod session;
pub mod text;

mod service;

pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus, Exchange};
pub use error::{ClientError, Result};
pub use metrics::{LatencyObserver, NoopObserver, TtfbRecorder};
pub use service::TtsService;
pub use session::{AudioChunk, Session, Step, Transition};
