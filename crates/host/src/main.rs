//! vcanvas host
//!
//! Drives one canvas session over stdin/stdout: one JSON command per input
//! line, one JSON response per output line. Logs go to stderr.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::FmtSubscriber;
use vcanvas_host::session::{self, Session, SessionHandle};
use vcanvas_host::Config;
use vcanvas_protocol::{decode_line, encode_line, CanvasCommand, CanvasResponse};

#[derive(Parser)]
#[command(name = "vcanvas-host")]
#[command(author, version, about = "Drive a vcanvas session over stdin/stdout")]
struct Args {
    /// Configuration file (default: standard search locations)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(&path),
        None => Config::load(),
    }
}

/// Read commands from stdin on a dedicated thread and write each response
/// before reading the next line.
fn spawn_stdin_thread(handle: SessionHandle) -> Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            let mut stdout = std::io::stdout();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                let (response, stop) = match decode_line::<CanvasCommand>(&line) {
                    Ok(cmd) => {
                        let stop = matches!(cmd, CanvasCommand::Stop);
                        match handle.blocking_request(cmd) {
                            Ok(response) => (response, stop),
                            Err(e) => {
                                debug!("{}", e);
                                return;
                            }
                        }
                    }
                    Err(e) => (CanvasResponse::error(format!("Invalid command: {}", e)), false),
                };

                let encoded = encode_line(&response).unwrap_or_else(|e| {
                    // Fall back to an error line that always fits.
                    encode_line(&CanvasResponse::error(e.to_string())).unwrap_or_default()
                });
                if stdout
                    .write_all(encoded.as_bytes())
                    .and_then(|_| stdout.flush())
                    .is_err()
                {
                    break;
                }
                if stop {
                    return;
                }
            }
            info!("Input closed");
            handle.blocking_shutdown();
        })
        .map_err(|e| anyhow!("Failed to spawn stdin-reader thread: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (needed for log level)
    let mut config = load_config(args.config).unwrap_or_else(|e| {
        // Can't use tracing yet, fall back to eprintln
        eprintln!("Failed to load configuration: {:#}. Using defaults.", e);
        Config::default()
    });

    // Stdout carries the protocol, so logs go to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Validate and clamp config values
    let config_warnings = config.validate();
    for w in &config_warnings {
        warn!("Config: {} - {}", w.field, w.message);
    }

    info!("vcanvas host starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded: cell={}x{}, scrollbar_thickness={}, layout_debounce_ms={}, log_level={}",
        config.layout.cell_width,
        config.layout.cell_height,
        config.scrolling.scrollbar_thickness,
        config.behavior.layout_debounce_ms,
        config.behavior.log_level
    );

    let (event_tx, event_rx) = session::channel();
    let session = Session::new(&config, event_tx.clone());

    // The reader is not joined: it may be blocked on stdin at exit.
    spawn_stdin_thread(SessionHandle::new(event_tx.clone()))?;

    // Install Ctrl+C handler so terminal kill triggers graceful shutdown
    {
        let shutdown = SessionHandle::new(event_tx.clone());
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Ctrl+C received, initiating shutdown...");
                shutdown.shutdown().await;
            }
        });
    }
    drop(event_tx);

    session.run(event_rx).await;

    info!("vcanvas host shutting down.");
    Ok(())
}
