//! Single-writer ingestion queue.
//!
//! One tokio task owns the [`Monitor`]. Producers (the transport, HTTP
//! handlers) send [`Command`]s over a bounded channel, so no two reductions
//! ever overlap. After each command the task publishes a fresh [`Snapshot`]
//! on a watch channel that any number of observers can subscribe to.

use anyhow::{Result, anyhow};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::snapshot::Snapshot;
use crate::core::types::ConnectionState;
use crate::engine::Monitor;
use crate::event::{Notification, decode};

#[derive(Debug)]
pub enum Command {
    Notify(Notification),
    Connection(ConnectionState),
    SelectModel(String),
    SelectPair(usize),
}

/// Cloneable handle for submitting commands to the ingestor.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Command>,
}

impl CommandSender {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| anyhow!("ingestor stopped"))
    }

    pub async fn notify(&self, notification: Notification) -> Result<()> {
        self.send(Command::Notify(notification)).await
    }

    pub async fn connection(&self, connection: ConnectionState) -> Result<()> {
        self.send(Command::Connection(connection)).await
    }

    pub async fn select_model(&self, model_id: impl Into<String>) -> Result<()> {
        self.send(Command::SelectModel(model_id.into())).await
    }

    pub async fn select_pair(&self, pair_index: usize) -> Result<()> {
        self.send(Command::SelectPair(pair_index)).await
    }
}

pub struct Ingestor {
    sender: CommandSender,
    snapshots: watch::Receiver<Snapshot>,
    task: JoinHandle<Monitor>,
}

impl Ingestor {
    /// Start the ingestion task. Must be called from within a tokio runtime.
    pub fn spawn(monitor: Monitor, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (snapshot_tx, snapshots) = watch::channel(monitor.snapshot());
        let task = tokio::spawn(run(monitor, rx, snapshot_tx));
        Self {
            sender: CommandSender { tx },
            snapshots,
            task,
        }
    }

    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Stop accepting commands, drain the queue and return the monitor.
    ///
    /// Waits for every outstanding [`CommandSender`] clone to be dropped.
    pub async fn shutdown(self) -> Result<Monitor> {
        drop(self.sender);
        self.task
            .await
            .map_err(|e| anyhow!("ingestor task failed: {e}"))
    }
}

async fn run(
    mut monitor: Monitor,
    mut commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<Snapshot>,
) -> Monitor {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Notify(notification) => {
                monitor.apply(&notification);
            }
            Command::Connection(connection) => monitor.set_connection(connection),
            Command::SelectModel(model_id) => monitor.select_model(&model_id),
            Command::SelectPair(pair_index) => monitor.select_pair(pair_index),
        }
        snapshots.send_replace(monitor.snapshot());
    }
    debug!("command channel closed, ingestor stopping");
    monitor
}

/// Decode one line of a notification feed, logging and skipping bad input.
pub fn decode_line(line: &str) -> Option<Notification> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match decode(line) {
        Ok(Notification::Unknown { kind }) => {
            debug!(kind = %kind, "skipping unknown notification kind");
            None
        }
        Ok(notification) => Some(notification),
        Err(err) => {
            warn!(error = %err, "dropping undecodable notification");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ExecutionKey;
    use crate::test_support::{model_start, run_start, step};

    #[tokio::test]
    async fn commands_are_applied_in_order_and_published() {
        let ingestor = Ingestor::spawn(Monitor::default(), 8);
        let sender = ingestor.sender();
        let mut snapshots = ingestor.subscribe();

        sender.notify(run_start("r1", &[("X", "Z"), ("P", "Q")])).await.expect("send");
        sender.notify(model_start("r1", "m", 0, "X")).await.expect("send");
        sender.notify(step("r1", "m", 0, "X", Some("Y"))).await.expect("send");
        sender.select_pair(1).await.expect("send");
        sender
            .connection(ConnectionState::Connected)
            .await
            .expect("send");
        drop(sender);

        let monitor = ingestor.shutdown().await.expect("shutdown");
        let snapshot = snapshots.borrow_and_update().clone();

        assert_eq!(snapshot.selection.pair_index, 1);
        assert!(snapshot.nodes.is_empty());
        assert_eq!(snapshot.connection, ConnectionState::Connected);
        let execution = monitor
            .state()
            .execution(&ExecutionKey::new("m", 0))
            .expect("execution");
        assert_eq!(execution.graph().len(), 2);
    }

    #[test]
    fn decode_line_skips_blank_unknown_and_malformed() {
        assert!(decode_line("   ").is_none());
        assert!(decode_line(r#"{"type":"ping","run_id":"r1"}"#).is_none());
        assert!(decode_line("{not json").is_none());
        assert!(
            decode_line(r#"{"type":"stop_requested","run_id":"r1","message":"stop"}"#).is_some()
        );
    }
}
