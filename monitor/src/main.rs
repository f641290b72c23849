//! Offline tooling for live-run monitor state.
//!
//! Replays a recorded JSONL notification feed through the same reducer the
//! dashboard uses and prints the resulting snapshot, which makes feed captures
//! easy to inspect and diff.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use monitor::core::snapshot::Snapshot;
use monitor::engine::Monitor;
use monitor::io::config::load_config;
use monitor::io::feed::read_feed;
use monitor::logging;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "monitor",
    version,
    about = "Reconstruct live benchmark run state from notification feeds"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reduce a JSONL feed and print the resulting snapshot as JSON.
    Replay {
        file: PathBuf,
        /// Select this model after replaying.
        #[arg(long)]
        model: Option<String>,
        /// Select this pair index after replaying.
        #[arg(long)]
        pair: Option<usize>,
    },
    /// Parse and validate a monitor config file.
    CheckConfig { file: PathBuf },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Replay { file, model, pair } => cmd_replay(&file, model.as_deref(), pair),
        Command::CheckConfig { file } => cmd_check_config(&file),
    }
}

fn cmd_replay(path: &Path, model: Option<&str>, pair: Option<usize>) -> Result<()> {
    let snapshot = replay(path, model, pair)?;
    let mut payload = serde_json::to_string_pretty(&snapshot).context("serialize snapshot")?;
    payload.push('\n');
    print!("{payload}");
    Ok(())
}

fn cmd_check_config(path: &Path) -> Result<()> {
    let cfg = load_config(path)?;
    println!(
        "ok: queue_capacity={} poll_interval_ms={} reconnect={}x{}ms",
        cfg.queue_capacity,
        cfg.feed.poll_interval_ms,
        cfg.reconnect.max_attempts,
        cfg.reconnect.interval_ms
    );
    Ok(())
}

/// Reduce every notification in `path`, then apply the requested selection.
fn replay(path: &Path, model: Option<&str>, pair: Option<usize>) -> Result<Snapshot> {
    let notifications = read_feed(path)?;
    let mut monitor = Monitor::default();
    let mut ignored = 0usize;
    for notification in &notifications {
        if monitor.apply(notification).ignored {
            ignored += 1;
        }
    }
    info!(
        path = %path.display(),
        applied = notifications.len() - ignored,
        ignored,
        "feed replayed"
    );
    if let Some(model_id) = model {
        monitor.select_model(model_id);
    }
    if let Some(pair_index) = pair {
        monitor.select_pair(pair_index);
    }
    Ok(monitor.snapshot())
}
