//! Feed follower: watches the JSONL notification file and feeds the ingestor.
//!
//! The feed counts as connected while it is readable. Read failures move the
//! connection to `Reconnecting`, retried at the configured interval, and after
//! the configured number of attempts to `Disconnected`. A later change to the
//! file still reconnects.

use std::path::{Path, PathBuf};

use anyhow::Result;
use monitor::core::types::ConnectionState;
use monitor::event::Notification;
use monitor::ingest::decode_line;
use monitor::io::feed::FeedCursor;
use notify::{Event as NotifyEvent, EventKind, PollWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::state::{AppState, ChangeEvent};

/// Result of one feed poll.
#[derive(Debug, Default)]
pub struct PollOutcome {
    pub notifications: Vec<Notification>,
    /// New connection state, when it changed.
    pub connection: Option<ConnectionState>,
}

/// Reads the feed and tracks the transport's connection state.
#[derive(Debug)]
pub struct FeedPump {
    cursor: FeedCursor,
    connection: ConnectionState,
    failures: u32,
    max_attempts: u32,
}

impl FeedPump {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            cursor: FeedCursor::new(),
            connection: ConnectionState::Connecting,
            failures: 0,
            max_attempts,
        }
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Failed reads are being retried on the reconnect interval.
    pub fn is_retrying(&self) -> bool {
        matches!(self.connection, ConnectionState::Reconnecting { .. })
    }

    pub fn poll(&mut self, path: &Path) -> PollOutcome {
        match self.cursor.read_new(path) {
            Ok(lines) => {
                self.failures = 0;
                let notifications = lines
                    .iter()
                    .map(String::as_str)
                    .filter_map(decode_line)
                    .collect();
                PollOutcome {
                    notifications,
                    connection: self.transition(ConnectionState::Connected),
                }
            }
            Err(err) => {
                self.failures = self.failures.saturating_add(1);
                let next = if self.failures > self.max_attempts {
                    ConnectionState::Disconnected
                } else {
                    ConnectionState::Reconnecting {
                        attempt: self.failures,
                        max_attempts: self.max_attempts,
                    }
                };
                debug!(error = %format!("{err:#}"), failures = self.failures, "feed read failed");
                PollOutcome {
                    notifications: Vec::new(),
                    connection: self.transition(next),
                }
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) -> Option<ConnectionState> {
        if self.connection == next {
            return None;
        }
        self.connection = next;
        Some(next)
    }
}

/// Start the feed watcher in a background task.
pub fn start_feed_watcher(state: AppState) {
    tokio::spawn(async move {
        if let Err(e) = run_feed_watcher(state).await {
            warn!(error = %e, "feed watcher failed");
        }
    });
}

async fn run_feed_watcher(state: AppState) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<NotifyEvent>(100);

    let mut watcher = PollWatcher::new(
        move |res: Result<NotifyEvent, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.try_send(event);
            }
        },
        notify::Config::default().with_poll_interval(state.config.feed.poll_interval()),
    )?;

    // Watch the parent so the feed may be created or replaced after startup.
    let watch_dir = feed_dir(&state.feed_path);
    watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;
    info!(path = %state.feed_path.display(), "following notification feed");

    state
        .commands
        .connection(ConnectionState::Connecting)
        .await?;
    let mut pump = FeedPump::new(state.config.reconnect.max_attempts);
    forward(&state, pump.poll(&state.feed_path)).await?;

    let mut dirty = false;
    let mut flush_tick = tokio::time::interval(state.config.feed.poll_interval());
    flush_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut retry_tick = tokio::time::interval(state.config.reconnect.interval());
    retry_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                if touches(&event, &state.feed_path) {
                    dirty = true;
                }
            }
            _ = flush_tick.tick() => {
                if !dirty || pump.is_retrying() {
                    continue;
                }
                dirty = false;
                forward(&state, pump.poll(&state.feed_path)).await?;
            }
            _ = retry_tick.tick() => {
                if pump.is_retrying() {
                    forward(&state, pump.poll(&state.feed_path)).await?;
                }
            }
        }
    }
}

/// Push a poll's results into the ingestor. Fails only if the ingestor stopped.
async fn forward(state: &AppState, outcome: PollOutcome) -> Result<()> {
    if let Some(connection) = outcome.connection {
        match connection {
            ConnectionState::Reconnecting {
                attempt,
                max_attempts,
            } => warn!(attempt, max_attempts, "feed unreadable, retrying"),
            ConnectionState::Disconnected => warn!("feed unreadable, giving up until it changes"),
            _ => info!(state = ?connection, "feed connection changed"),
        }
        state.commands.connection(connection).await?;
        let _ = state.event_tx.send(ChangeEvent::ConnectionChanged(connection));
    }
    for notification in outcome.notifications {
        state.commands.notify(notification).await?;
    }
    Ok(())
}

fn touches(event: &NotifyEvent, feed_path: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|path| path == feed_path)
}

fn feed_dir(feed_path: &Path) -> PathBuf {
    match feed_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const RUN_START: &str =
        r#"{"type":"run_start","run_id":"r1","total_models":1,"start_page":"A","target_page":"B"}"#;

    fn modify_event(path: PathBuf) -> NotifyEvent {
        NotifyEvent {
            kind: EventKind::Modify(notify::event::ModifyKind::Any),
            paths: vec![path],
            attrs: Default::default(),
        }
    }

    #[test]
    fn readable_feed_connects_and_decodes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("feed.jsonl");
        fs::write(&path, format!("{RUN_START}\nnot json\n")).expect("write");

        let mut pump = FeedPump::new(3);
        let outcome = pump.poll(&path);

        assert_eq!(outcome.connection, Some(ConnectionState::Connected));
        assert_eq!(outcome.notifications.len(), 1);
        assert!(pump.poll(&path).connection.is_none());
    }

    #[test]
    fn failures_count_up_then_disconnect() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("missing.jsonl");
        let mut pump = FeedPump::new(2);

        let states: Vec<_> = (0..4).map(|_| pump.poll(&path).connection).collect();
        assert_eq!(
            states,
            vec![
                Some(ConnectionState::Reconnecting {
                    attempt: 1,
                    max_attempts: 2
                }),
                Some(ConnectionState::Reconnecting {
                    attempt: 2,
                    max_attempts: 2
                }),
                Some(ConnectionState::Disconnected),
                None,
            ]
        );
        assert!(!pump.is_retrying());
    }

    #[test]
    fn recovers_after_feed_appears() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("feed.jsonl");
        let mut pump = FeedPump::new(5);
        assert!(pump.poll(&path).notifications.is_empty());
        assert!(pump.is_retrying());

        fs::write(&path, format!("{RUN_START}\n")).expect("write");
        let outcome = pump.poll(&path);
        assert_eq!(outcome.connection, Some(ConnectionState::Connected));
        assert_eq!(outcome.notifications.len(), 1);
        assert_eq!(pump.connection(), ConnectionState::Connected);
    }

    #[test]
    fn only_feed_path_events_count() {
        let feed = PathBuf::from("/tmp/run/feed.jsonl");
        assert!(touches(&modify_event(feed.clone()), &feed));
        assert!(!touches(&modify_event(PathBuf::from("/tmp/run/other.log")), &feed));
    }

    #[test]
    fn bare_file_name_watches_current_dir() {
        assert_eq!(feed_dir(Path::new("feed.jsonl")), PathBuf::from("."));
        assert_eq!(feed_dir(Path::new("/var/run/feed.jsonl")), PathBuf::from("/var/run"));
    }
}
