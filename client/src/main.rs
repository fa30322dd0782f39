//! Doubao TTS Client
//!
//! Sends text to the Doubao streaming TTS endpoint and saves the returned
//! audio as WAV.
//!
//! Usage:
//!   # Interactive mode (type text, press Enter to synthesize)
//!   DOUBAO_APPID=... DOUBAO_TOKEN=... cargo run --release -p doubao-client
//!
//!   # Single text mode
//!   cargo run --release -p doubao-client -- --text "你好" --output hello.wav
//!
//!   # Against the local reference server
//!   cargo run --release -p doubao-client -- --url ws://127.0.0.1:9876 --appid dev --token dev

mod audio;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use doubao_client::text::{split_utterances, MAX_TEXT_BYTES};
use doubao_client::{AudioChunk, ClientConfig, TtfbRecorder, TtsService};
use doubao_protocol::VoiceSettings;

#[derive(Parser, Debug)]
#[command(author, version, about = "Doubao streaming TTS client")]
struct Args {
    /// Websocket endpoint
    #[arg(long, env = "DOUBAO_URL")]
    url: Option<String>,

    /// Application id
    #[arg(long, env = "DOUBAO_APPID")]
    appid: String,

    /// Access token
    #[arg(long, env = "DOUBAO_TOKEN", hide_env_values = true)]
    token: String,

    /// Cluster name
    #[arg(long, env = "DOUBAO_CLUSTER")]
    cluster: Option<String>,

    /// Text to synthesize (if not provided, runs in interactive mode)
    #[arg(short, long)]
    text: Option<String>,

    /// Output file for single text mode
    #[arg(short, long, default_value = "out.wav")]
    output: PathBuf,

    /// Voice to use
    #[arg(short, long, env = "DOUBAO_VOICE")]
    voice: Option<String>,

    /// Speech speed ratio (0.5-2.0)
    #[arg(long, default_value = "1.0")]
    speed: f32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("doubao_client=info".parse()?)
                .add_directive("tokio_tungstenite=warn".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut voice = VoiceSettings::default().with_speed(args.speed);
    if let Some(v) = &args.voice {
        voice = voice.with_voice(v);
    }
    let mut config = ClientConfig::new(&args.appid, &args.token).with_voice(voice);
    if let Some(url) = &args.url {
        config = config.with_api_url(url);
    }
    if let Some(cluster) = &args.cluster {
        config = config.with_cluster(cluster);
    }

    let recorder = Arc::new(TtfbRecorder::new());
    let mut service = TtsService::new(config).with_observer(recorder.clone());

    info!("Connecting to {}", service.config().api_url);
    service.start().await;

    if let Some(text) = args.text {
        // Single text mode
        let chunks = synthesize_text(&service, &recorder, &text).await?;
        save(&args.output, &chunks)?;
    } else {
        // Interactive mode
        println!("Doubao TTS Client - Interactive Mode");
        println!("====================================");
        println!("Type text and press Enter to synthesize.");
        println!("Ctrl-C interrupts synthesis; at the prompt it exits.");
        println!("Commands:");
        println!("  :q or :quit - Exit");
        println!("  :v <voice>  - Change voice");
        println!("  :s <speed>  - Change speed (0.5-2.0)");
        println!();

        let mut lines = spawn_line_reader();
        let mut stdout = io::stdout();
        let mut count = 0usize;

        loop {
            print!("> ");
            stdout.flush()?;

            let line = tokio::select! {
                line = lines.recv() => line,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    None
                }
            };
            // EOF or Ctrl-C
            let Some(line) = line else {
                break;
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // Handle commands
            if line == ":q" || line == ":quit" {
                println!("Goodbye!");
                break;
            }

            if let Some(new_voice) = line.strip_prefix(":v ") {
                let config = service.config().clone();
                let voice = config.voice.clone().with_voice(new_voice.trim());
                service = rebuild(&service, config.with_voice(voice), &recorder).await;
                println!("Voice changed to: {}", new_voice.trim());
                continue;
            }

            if let Some(new_speed) = line.strip_prefix(":s ") {
                match new_speed.trim().parse::<f32>() {
                    Ok(s) if (0.5..=2.0).contains(&s) => {
                        let config = service.config().clone();
                        let voice = config.voice.clone().with_speed(s);
                        service = rebuild(&service, config.with_voice(voice), &recorder).await;
                        println!("Speed changed to: {}", s);
                    }
                    _ => {
                        println!("Invalid speed. Use a value between 0.5 and 2.0");
                    }
                }
                continue;
            }

            match synthesize_text(&service, &recorder, line).await {
                Ok(chunks) if chunks.is_empty() => println!("No audio received"),
                Ok(chunks) => {
                    count += 1;
                    let path = PathBuf::from(format!("utterance-{count}.wav"));
                    if let Err(e) = save(&path, &chunks) {
                        error!("Error: {}", e);
                    }
                }
                Err(e) => error!("Error: {}", e),
            }
        }
    }

    service.stop().await;

    Ok(())
}

/// Read stdin lines on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_line_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Replace the service after a voice change; the old connection is closed.
async fn rebuild(
    old: &TtsService,
    config: ClientConfig,
    recorder: &Arc<TtfbRecorder>,
) -> TtsService {
    old.stop().await;
    TtsService::new(config).with_observer(recorder.clone())
}

/// Synthesize `text` utterance by utterance. Ctrl-C interrupts the
/// utterance in progress and keeps what arrived so far.
async fn synthesize_text(
    service: &TtsService,
    recorder: &TtfbRecorder,
    text: &str,
) -> Result<Vec<AudioChunk>> {
    let mut chunks = Vec::new();

    for utterance in split_utterances(text, MAX_TEXT_BYTES) {
        let stream = service.synthesize(&utterance);
        futures_util::pin_mut!(stream);

        loop {
            tokio::select! {
                next = stream.next() => match next {
                    Some(Ok(chunk)) => chunks.push(chunk),
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted");
                    service.handle_interruption().await;
                    return Ok(chunks);
                }
            }
        }

        if let Some(ttfb) = recorder.last_ttfb() {
            info!("First audio after {:?}", ttfb);
        }
    }

    Ok(chunks)
}

fn save(path: &Path, chunks: &[AudioChunk]) -> Result<()> {
    let duration = audio::save_pcm_chunks(path, chunks)?;
    println!("Audio saved to: {} ({:.2}s)", path.display(), duration);
    Ok(())
}
