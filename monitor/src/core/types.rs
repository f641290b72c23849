//! Shared deterministic types for live-run monitoring.
//!
//! These types define the stable contracts between the reducer, the view
//! selector and the snapshot projection. They carry no behaviour that depends
//! on external state or I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A declared (start resource, target resource) navigation goal.
///
/// Immutable once the run has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPair {
    pub start_page: String,
    pub target_page: String,
}

impl TaskPair {
    pub fn new(start_page: impl Into<String>, target_page: impl Into<String>) -> Self {
        Self {
            start_page: start_page.into(),
            target_page: target_page.into(),
        }
    }
}

/// Identity of one model execution: a model run against one task pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionKey {
    pub model_id: String,
    pub pair_index: usize,
}

impl ExecutionKey {
    pub fn new(model_id: impl Into<String>, pair_index: usize) -> Self {
        Self {
            model_id: model_id.into(),
            pair_index,
        }
    }
}

/// Lifecycle status of a model execution. Absence means "not yet started".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

/// Display role of a node in a navigation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Start,
    Current,
    Visited,
    Target,
    Failed,
    /// The resource could not be fetched (404); the trajectory backtracked.
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Normal,
    Backtrack,
    Loop,
}

/// Per-execution aggregate metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunMetrics {
    /// Distinct step notifications recorded.
    pub visit_count: u32,
    /// Steps whose proposed concept was not in the resource mapping.
    pub anomaly_count: u32,
    /// Sum of reported model latency across recorded steps, in seconds.
    pub elapsed_secs: f64,
}

/// Authoritative outcome reported by the execution engine when a model finishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOutcome {
    pub reason: String,
    pub total_steps: u32,
    pub total_duration: f64,
    pub hallucination_count: u32,
}

/// Transport connection state as observed by the monitor.
///
/// The transport owns reconnection; the monitor only records what it is told.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Reconnecting {
        attempt: u32,
        max_attempts: u32,
    },
    Disconnected,
}

/// Which execution the viewer is looking at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub model_id: Option<String>,
    pub pair_index: usize,
}

impl Selection {
    pub fn key(&self) -> Option<ExecutionKey> {
        self.model_id
            .as_ref()
            .map(|model_id| ExecutionKey::new(model_id.clone(), self.pair_index))
    }
}

/// Declared run shape, as announced by run-level notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Model count announced by `run_created`; informational only.
    pub declared_models: Option<usize>,
    pub total_models: usize,
    /// Index of the most recently started model.
    pub current_model_index: Option<usize>,
}

/// Final tally announced by `run_completed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSummary {
    pub total_models: usize,
    pub models: Vec<String>,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One human-readable trace line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub message: String,
    pub severity: Severity,
}
