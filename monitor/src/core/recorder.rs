//! Human-readable trace of the notification stream.
//!
//! One line per notable notification, kept in the bounded [`LogBuffer`] of the
//! run state. This is a viewer-facing trail, unrelated to `tracing` output.

use chrono::{DateTime, Utc};

use crate::core::state::RunState;
use crate::core::types::{LogEntry, Severity};
use crate::event::{Notification, OutcomeStatus};

/// Append the log line for `notification`, if it has one.
pub fn record(state: &mut RunState, notification: &Notification, at: DateTime<Utc>) {
    if let Some((label, message, severity)) = describe(notification) {
        state.logs.push(LogEntry {
            timestamp: at,
            label: label.to_string(),
            message,
            severity,
        });
    }
}

fn describe(notification: &Notification) -> Option<(&'static str, String, Severity)> {
    let line = match notification {
        Notification::RunCreated(n) => (
            "RUN",
            match n.total_models {
                Some(total) => format!("Run {} created with {total} model(s)", n.run_id),
                None => format!("Run {} created", n.run_id),
            },
            Severity::Info,
        ),
        Notification::ReadyToStart(n) => {
            ("RUN", or_default(&n.message, "Ready to start"), Severity::Info)
        }
        Notification::RunStart(n) => {
            let pairs = n.task_pairs();
            let route = match pairs.as_slice() {
                [only] => format!("{} -> {}", only.start_page, only.target_page),
                _ => format!("{} task pairs", pairs.len()),
            };
            (
                "RUN",
                format!("Run started: {route}, {} model(s)", n.total_models),
                Severity::Info,
            )
        }
        Notification::ModelStart(n) => {
            // Indices come off the wire unchecked; display them 1-based.
            let position = n.model_index.saturating_add(1);
            (
                "MODEL",
                format!(
                    "{} started on pair {} ({}/{})",
                    n.model_id,
                    n.pair_index.unwrap_or(0).saturating_add(1),
                    position,
                    n.total_models.max(position)
                ),
                Severity::Info,
            )
        }
        Notification::Step(n) => {
            let data = &n.data;
            if data.is_404 {
                (
                    "STEP",
                    format!(
                        "{} #{}: {} not found, backtracking",
                        n.model_id, data.step, data.page_title
                    ),
                    Severity::Warning,
                )
            } else if data.is_anomaly() {
                (
                    "ANOMALY",
                    format!(
                        "{} #{}: invalid concept {} on {}",
                        n.model_id,
                        data.step,
                        data.next_concept_id.as_deref().unwrap_or("<none>"),
                        data.page_title
                    ),
                    Severity::Warning,
                )
            } else {
                let next = data.next_page_title.as_deref().unwrap_or("(stay)");
                (
                    "STEP",
                    format!(
                        "{} #{}: {} -> {} ({:.2}s)",
                        n.model_id, data.step, data.page_title, next, data.llm_duration
                    ),
                    Severity::Info,
                )
            }
        }
        Notification::Hallucination(n) => (
            "ANOMALY",
            format!(
                "{} proposed {} on {} (retry {}/{})",
                n.model_id,
                n.data.invalid_concept_id.as_deref().unwrap_or("<none>"),
                n.data.page_title,
                n.data.retry_number,
                n.data.max_retries
            ),
            Severity::Warning,
        ),
        Notification::ModelComplete(n) | Notification::ModelFinal(n) => {
            let metrics = n.data.metrics();
            let severity = match metrics.status {
                OutcomeStatus::Success => Severity::Success,
                _ => Severity::Error,
            };
            let verdict = match metrics.status {
                OutcomeStatus::Success => "succeeded",
                OutcomeStatus::Stopped => "stopped",
                _ => "failed",
            };
            (
                "MODEL",
                format!(
                    "{} {verdict} in {} step(s): {}",
                    n.model_id, metrics.total_steps, metrics.reason
                ),
                severity,
            )
        }
        Notification::Error(n) => ("ERROR", or_default(&n.error, "Run failed"), Severity::Error),
        Notification::StopRequested(n) => {
            ("STOP", or_default(&n.message, "Stop requested"), Severity::Warning)
        }
        Notification::ModelStopped(n) => (
            "STOP",
            or_default(
                &n.message,
                &format!("{} stopped", n.model_id.as_deref().unwrap_or("model")),
            ),
            Severity::Warning,
        ),
        Notification::RunStopped(n) => {
            ("STOP", or_default(&n.message, "Run stopped"), Severity::Warning)
        }
        Notification::RunCompleted(n) => (
            "DONE",
            or_default(
                &n.message,
                &format!(
                    "Run completed: {} succeeded, {} failed",
                    n.summary.completed, n.summary.failed
                ),
            ),
            Severity::Success,
        ),
        Notification::Unknown { .. } => return None,
    };
    Some(line)
}

fn or_default(message: &str, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::LOG_CAPACITY;
    use crate::test_support::{
        fixed_time, hallucinated_step, model_complete, not_found_step, run_start, step,
    };

    fn last(state: &RunState) -> &LogEntry {
        state.logs().iter().last().expect("log entry")
    }

    #[test]
    fn step_line_names_model_and_route() {
        let mut state = RunState::default();
        record(&mut state, &step("r1", "m", 3, "Paris", Some("France")), fixed_time());

        let entry = last(&state);
        assert_eq!(entry.label, "STEP");
        assert_eq!(entry.severity, Severity::Info);
        assert!(entry.message.contains("m #3: Paris -> France"));
    }

    #[test]
    fn anomalies_and_not_found_are_warnings() {
        let mut state = RunState::default();
        record(&mut state, &hallucinated_step("r1", "m", 1, "Paris"), fixed_time());
        assert_eq!(last(&state).label, "ANOMALY");

        record(&mut state, &not_found_step("r1", "m", 2, "Ghost"), fixed_time());
        assert_eq!(last(&state).severity, Severity::Warning);
        assert!(last(&state).message.contains("not found"));
    }

    #[test]
    fn failed_model_is_an_error_line() {
        let mut state = RunState::default();
        record(
            &mut state,
            &model_complete("r1", "m", None, OutcomeStatus::Failed),
            fixed_time(),
        );
        assert_eq!(last(&state).severity, Severity::Error);
    }

    #[test]
    fn unknown_kinds_are_not_recorded() {
        let mut state = RunState::default();
        record(
            &mut state,
            &Notification::Unknown {
                kind: "ping".to_string(),
            },
            fixed_time(),
        );
        assert!(state.logs().is_empty());
    }

    #[test]
    fn trail_keeps_most_recent_lines() {
        let mut state = RunState::default();
        record(&mut state, &run_start("r1", &[("A", "B")]), fixed_time());
        for n in 0..60 {
            record(&mut state, &step("r1", "m", n, "A", Some("B")), fixed_time());
        }

        assert_eq!(state.logs().len(), LOG_CAPACITY);
        assert!(last(&state).message.contains("#59"));
        assert!(state.logs().iter().all(|e| e.label == "STEP"));
    }
}
