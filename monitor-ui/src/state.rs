//! Shared application state for the dashboard server.

use std::path::PathBuf;
use std::sync::Arc;

use monitor::core::snapshot::Snapshot;
use monitor::core::types::ConnectionState;
use monitor::ingest::CommandSender;
use monitor::io::config::MonitorConfig;
use tokio::sync::{broadcast, watch};

/// Events broadcast to SSE clients alongside snapshot updates.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// The run finished and settled; clients should move to the archived run.
    RunCompleted { run_id: String },
    /// The feed transport changed connection state.
    ConnectionChanged(ConnectionState),
}

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// JSONL notification feed being followed.
    pub feed_path: PathBuf,
    pub config: Arc<MonitorConfig>,
    /// Queue into the single-writer ingestor.
    pub commands: CommandSender,
    /// Latest published snapshot.
    pub snapshots: watch::Receiver<Snapshot>,
    /// Broadcast sender for run completion and connection events.
    pub event_tx: Arc<broadcast::Sender<ChangeEvent>>,
}

impl AppState {
    pub fn new(
        feed_path: PathBuf,
        config: MonitorConfig,
        commands: CommandSender,
        snapshots: watch::Receiver<Snapshot>,
        event_tx: Arc<broadcast::Sender<ChangeEvent>>,
    ) -> Self {
        Self {
            feed_path,
            config: Arc::new(config),
            commands,
            snapshots,
            event_tx,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }
}
