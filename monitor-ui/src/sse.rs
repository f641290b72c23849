//! Server-Sent Events stream of snapshots and run events.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use monitor::core::snapshot::Snapshot;
use monitor::core::types::ConnectionState;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::state::{AppState, ChangeEvent};

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SsePayload<'a> {
    RunCompleted { run_id: &'a str },
    Connection { connection: ConnectionState },
}

impl<'a> From<&'a ChangeEvent> for SsePayload<'a> {
    fn from(event: &'a ChangeEvent) -> Self {
        match event {
            ChangeEvent::RunCompleted { run_id } => SsePayload::RunCompleted { run_id },
            ChangeEvent::ConnectionChanged(connection) => SsePayload::Connection {
                connection: *connection,
            },
        }
    }
}

impl SsePayload<'_> {
    fn event_name(&self) -> &'static str {
        match self {
            SsePayload::RunCompleted { .. } => "run_completed",
            SsePayload::Connection { .. } => "connection",
        }
    }
}

enum Outgoing {
    Snapshot(Snapshot),
    Change(ChangeEvent),
    Closed,
}

fn snapshot_event(snapshot: &Snapshot) -> Option<Event> {
    let json = serde_json::to_string(snapshot).ok()?;
    Some(Event::default().event("snapshot").data(json))
}

fn change_event(change: &ChangeEvent) -> Option<Event> {
    let payload = SsePayload::from(change);
    let json = serde_json::to_string(&payload).ok()?;
    Some(Event::default().event(payload.event_name()).data(json))
}

/// SSE endpoint handler.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut snapshots = state.snapshots.clone();
    let mut rx = state.event_tx.subscribe();

    let stream = async_stream::stream! {
        let initial = snapshots.borrow_and_update().clone();
        if let Some(event) = snapshot_event(&initial) {
            yield Ok(event);
        }

        loop {
            let next = tokio::select! {
                changed = snapshots.changed() => match changed {
                    Ok(()) => Outgoing::Snapshot(snapshots.borrow_and_update().clone()),
                    Err(_) => Outgoing::Closed,
                },
                received = rx.recv() => match received {
                    Ok(change) => Outgoing::Change(change),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "SSE client lagged, some events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => Outgoing::Closed,
                },
            };

            match next {
                Outgoing::Snapshot(snapshot) => {
                    if let Some(event) = snapshot_event(&snapshot) {
                        yield Ok(event);
                    }
                }
                Outgoing::Change(change) => {
                    if let Some(event) = change_event(&change) {
                        yield Ok(event);
                    }
                }
                Outgoing::Closed => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_completed_payload_carries_run_id() {
        let change = ChangeEvent::RunCompleted {
            run_id: "r1".to_string(),
        };
        let payload = SsePayload::from(&change);
        assert_eq!(payload.event_name(), "run_completed");
        let json = serde_json::to_value(&payload).expect("json");
        assert_eq!(json["type"], "run_completed");
        assert_eq!(json["run_id"], "r1");
    }

    #[test]
    fn connection_payload_nests_tagged_state() {
        let change = ChangeEvent::ConnectionChanged(ConnectionState::Reconnecting {
            attempt: 2,
            max_attempts: 5,
        });
        let json = serde_json::to_value(SsePayload::from(&change)).expect("json");
        assert_eq!(json["type"], "connection");
        assert_eq!(json["connection"]["state"], "reconnecting");
        assert_eq!(json["connection"]["attempt"], 2);
    }
}
