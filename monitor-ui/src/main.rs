//! Monitor UI server - live dashboard backend for benchmark runs.
//!
//! Follows a JSONL notification feed, reconstructs run state through the
//! `monitor` engine and serves snapshots over HTTP and SSE.

mod feed;
mod routes;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use monitor::completion::CompletionNotifier;
use monitor::engine::Monitor;
use monitor::ingest::Ingestor;
use monitor::io::config::{MonitorConfig, load_config};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::state::{AppState, ChangeEvent};

#[derive(Parser)]
#[command(name = "monitor-ui")]
#[command(about = "Live dashboard backend for benchmark runs")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "3001")]
    port: u16,

    /// JSONL notification feed to follow
    #[arg(long)]
    feed: PathBuf,

    /// Monitor config file (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory containing UI static files
    #[arg(long)]
    ui_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("monitor_ui=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => MonitorConfig::default(),
    };
    let feed_path = std::path::absolute(&args.feed)?;
    info!(feed = %feed_path.display(), "starting monitor-ui");

    let (event_tx, _) = broadcast::channel(64);
    let event_tx = Arc::new(event_tx);
    let completion_tx = Arc::clone(&event_tx);
    let notifier = CompletionNotifier::new(move |run_id| {
        info!(run_id = %run_id, "run settled, notifying clients");
        let _ = completion_tx.send(ChangeEvent::RunCompleted { run_id });
    });

    let ingestor = Ingestor::spawn(Monitor::new(notifier), config.queue_capacity);
    let state = AppState::new(
        feed_path,
        config,
        ingestor.sender(),
        ingestor.subscribe(),
        event_tx,
    );

    feed::start_feed_watcher(state.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .nest("/api", routes::api_router())
        .route("/events", get(sse::events_handler))
        .layer(cors)
        .with_state(state);

    if let Some(ui_dir) = args.ui_dir {
        if ui_dir.exists() {
            info!(ui_dir = %ui_dir.display(), "serving static UI files");
            app = app
                .fallback_service(ServeDir::new(ui_dir).append_index_html_on_directories(true));
        } else {
            info!(ui_dir = %ui_dir.display(), "UI directory not found, API-only mode");
        }
    }

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
