//! `gemini-live-helper`: runs one Live session for a front-end process.
//!
//! Commands arrive as JSON lines on stdin, events leave as JSON lines on
//! stdout. Logs go to stderr.

use clap::Parser;
use gemini_live_rt::config::LogFormat;
use gemini_live_rt::{HelperConfig, LiveHelperBuilder, UiCommand, UiEvent, UiEvents};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

const EVENT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "gemini-live-helper", version, about = "Realtime voice helper for the Gemini Live API")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "GEMINI_LIVE_CONFIG", default_value = "gemini-live-helper.toml")]
    config: PathBuf,
}

fn init_logging(config: &HelperConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Plain => builder.init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let loaded = match HelperConfig::from_file(&args.config) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("gemini-live-helper: {err}");
            return ExitCode::FAILURE;
        }
    };
    let found = loaded.is_some();
    let config = loaded.unwrap_or_default();
    init_logging(&config);
    if !found {
        tracing::warn!(path = %args.config.display(), "Configuration file not found, using defaults");
    }

    let spawned = LiveHelperBuilder::from_config(&config).and_then(LiveHelperBuilder::spawn);
    let (session, events) = match spawned {
        Ok(parts) => parts,
        Err(err) => {
            tracing::error!(error = %err, "Failed to start helper");
            return ExitCode::FAILURE;
        }
    };
    let writer = tokio::spawn(write_events(events));
    tracing::info!(config = %args.config.display(), "Helper ready for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<UiCommand>(line) {
                    Ok(command) => {
                        if session.handle_command(command).await.is_err() {
                            tracing::error!("Session stopped unexpectedly");
                            break;
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "Ignoring malformed command"),
                }
            }
            Ok(None) => {
                tracing::info!("stdin closed, shutting down");
                break;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to read stdin");
                break;
            }
        }
    }

    let _ = session.shutdown().await;
    drop(session);
    if tokio::time::timeout(EVENT_FLUSH_TIMEOUT, writer).await.is_err() {
        tracing::warn!("Timed out flushing events");
    }
    ExitCode::SUCCESS
}

async fn write_events(mut events: UiEvents) {
    let mut stdout = tokio::io::stdout();
    while let Some(event) = events.recv().await {
        if let Err(err) = write_event(&mut stdout, &event).await {
            tracing::error!(error = %err, "Failed to write event, stopping output");
            break;
        }
    }
}

async fn write_event(stdout: &mut tokio::io::Stdout, event: &UiEvent) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(event).map_err(std::io::Error::other)?;
    line.push(b'\n');
    stdout.write_all(&line).await?;
    stdout.flush().await
}
