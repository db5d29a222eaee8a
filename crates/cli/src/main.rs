//! vcanvas CLI
//!
//! Command-line front end for vcanvas: replay a session script, compute a
//! scrollbar negotiation offline, and inspect configuration.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::FmtSubscriber;
use vcanvas_core::{Axis, Rect, ScrollbarState, Scrollbars, Size};
use vcanvas_host::session::{self, Session, SessionHandle};
use vcanvas_host::Config;
use vcanvas_protocol::{decode_line, encode_line, CanvasCommand, CanvasResponse};

#[derive(Parser)]
#[command(name = "vcanvas-cli")]
#[command(author, version, about = "Replay and inspect vcanvas sessions")]
struct Cli {
    /// Configuration file (default: standard search locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script of JSON command lines against a headless session
    Replay {
        /// Script file; blank lines and lines starting with '#' are skipped
        script: PathBuf,
    },
    /// Compute which scrollbars a viewport needs
    Negotiate {
        /// Virtual extent as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        content: Size,
        /// Client size as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        client: Size,
        /// Scrollbar thickness (default: from config)
        #[arg(short, long)]
        thickness: Option<i32>,
    },
    /// Print the default configuration as TOML
    DefaultConfig,
    /// Load and validate the configuration, printing any adjustments
    CheckConfig,
}

fn parse_size(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let width = w
        .trim()
        .parse()
        .map_err(|e| format!("invalid width '{}': {}", w, e))?;
    let height = h
        .trim()
        .parse()
        .map_err(|e| format!("invalid height '{}': {}", h, e))?;
    Ok(Size::new(width, height))
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

/// Result of an offline negotiation.
#[derive(Debug, Serialize)]
struct NegotiationReport {
    horizontal: ScrollbarState,
    vertical: ScrollbarState,
    item_area: Rect,
}

fn negotiate(content: Size, client: Size, thickness: i32, small_step: i32) -> NegotiationReport {
    let mut bars = Scrollbars::new(thickness, small_step);
    bars.set_client(client);
    bars.set_extents(Some(content.width), Some(content.height));
    bars.negotiate();
    NegotiationReport {
        horizontal: bars.axis(Axis::Horizontal).scrollbar_state(),
        vertical: bars.axis(Axis::Vertical).scrollbar_state(),
        item_area: bars.item_area(),
    }
}

/// Parse a script into commands. Errors name the offending line.
fn parse_script(script: &str) -> Result<Vec<CanvasCommand>> {
    script
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(n, line)| {
            decode_line(line).with_context(|| format!("Invalid command on line {}", n + 1))
        })
        .collect()
}

async fn send_all(handle: SessionHandle, commands: Vec<CanvasCommand>) -> Result<Vec<CanvasResponse>> {
    let mut responses = Vec::with_capacity(commands.len());
    for cmd in commands {
        let stop = matches!(cmd, CanvasCommand::Stop);
        responses.push(handle.request(cmd).await?);
        if stop {
            return Ok(responses);
        }
    }
    handle.shutdown().await;
    Ok(responses)
}

/// Run commands in order against a fresh session and collect the responses.
/// A `stop` command ends the replay early.
async fn replay(config: &Config, commands: Vec<CanvasCommand>) -> Result<Vec<CanvasResponse>> {
    let (tx, rx) = session::channel();
    let session = Session::new(config, tx.clone());
    let handle = SessionHandle::new(tx);

    let (_, responses) = tokio::join!(session.run(rx), send_all(handle, commands));
    responses
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref()).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {:#}. Using defaults.", e);
        Config::default()
    });

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Replay { script } => {
            for w in config.validate() {
                tracing::warn!("Config: {} - {}", w.field, w.message);
            }
            let text = std::fs::read_to_string(&script)
                .with_context(|| format!("Failed to read script: {}", script.display()))?;
            let commands = parse_script(&text)?;
            let responses = replay(&config, commands).await?;

            let mut stdout = std::io::stdout().lock();
            for response in &responses {
                stdout.write_all(encode_line(response)?.as_bytes())?;
            }
            let failed = responses
                .iter()
                .filter(|r| matches!(r, CanvasResponse::Error { .. }))
                .count();
            if failed > 0 {
                bail!("{} of {} commands failed", failed, responses.len());
            }
        }
        Commands::Negotiate {
            content,
            client,
            thickness,
        } => {
            for w in config.validate() {
                tracing::warn!("Config: {} - {}", w.field, w.message);
            }
            let thickness = thickness.unwrap_or(config.scrolling.scrollbar_thickness);
            if thickness < 0 {
                return Err(anyhow!("thickness must not be negative, got {}", thickness));
            }
            let report = negotiate(content, client, thickness, config.scrolling.small_step);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::DefaultConfig => {
            print!("{}", toml::to_string_pretty(&Config::default())?);
        }
        Commands::CheckConfig => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration OK");
            } else {
                for w in &warnings {
                    println!("{}: {}", w.field, w.message);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("400x300"), Ok(Size::new(400, 300)));
        assert_eq!(parse_size("10X20"), Ok(Size::new(10, 20)));
        assert!(parse_size("400").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn test_negotiate_args() {
        let cli = Cli::try_parse_from([
            "vcanvas-cli",
            "negotiate",
            "--content",
            "2000x2000",
            "--client",
            "400x300",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Negotiate { thickness: None, .. }
        ));
    }

    #[test]
    fn test_negotiate_both_scrollbars() {
        let report = negotiate(Size::new(2000, 2000), Size::new(400, 300), 17, 16);
        assert!(report.horizontal.visible);
        assert!(report.vertical.visible);
        assert_eq!(report.item_area, Rect::new(0, 0, 383, 283));
    }

    #[test]
    fn test_negotiate_content_fits() {
        let report = negotiate(Size::new(300, 200), Size::new(400, 300), 17, 16);
        assert!(!report.horizontal.visible);
        assert!(!report.vertical.visible);
        assert_eq!(report.item_area, Rect::new(0, 0, 400, 300));
    }

    #[test]
    fn test_parse_script_skips_comments() {
        let script = "# setup\n{\"type\": \"attach\"}\n\n{\"type\": \"query_state\"}\n";
        let commands = parse_script(script).unwrap();
        assert_eq!(commands, vec![CanvasCommand::Attach, CanvasCommand::QueryState]);
    }

    #[test]
    fn test_parse_script_reports_line() {
        let err = parse_script("{\"type\": \"attach\"}\nnonsense\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_replay_stops_at_stop() {
        let commands = vec![
            CanvasCommand::Attach,
            CanvasCommand::Stop,
            CanvasCommand::QueryState,
        ];
        let responses = replay(&Config::default(), commands).await.unwrap();
        assert_eq!(responses, vec![CanvasResponse::Ok, CanvasResponse::Ok]);
    }
}
