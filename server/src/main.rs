//! Doubao TTS reference server
//!
//! Speaks the binary TTS protocol and answers every request with a synthetic
//! tone.
//!
//! Usage:
//!   cargo run --release -p doubao-server
//!
//! The server listens on ws://127.0.0.1:9876 by default. Set
//! `DOUBAO_SERVER_TOKEN` to require a matching access token.

use anyhow::Result;
use tokio::net::TcpListener;

use doubao_server::{serve, ServerConfig};

const DEFAULT_ADDR: &str = "127.0.0.1:9876";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("doubao_server=info".parse()?)
                .add_directive("tokio_tungstenite=warn".parse()?),
        )
        .init();

    let addr = std::env::var("DOUBAO_SERVER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let config = ServerConfig {
        token: std::env::var("DOUBAO_SERVER_TOKEN").ok(),
        ..ServerConfig::default()
    };

    let listener = TcpListener::bind(&addr).await?;
    serve(listener, config).await
}
