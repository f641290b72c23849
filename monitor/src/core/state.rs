//! Run-level state owned exclusively by the monitor.
//!
//! Fields are private: every mutation flows through the reducer, the view
//! selector or the log recorder. Readers get accessors and the snapshot.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::core::graph::NavigationGraph;
use crate::core::types::{
    ConnectionState, ExecutionKey, ExecutionOutcome, ExecutionStatus, LogEntry, Progress,
    RunMetrics, RunSummary, Selection, TaskPair,
};

/// Most recent log lines retained; older lines are evicted first.
pub const LOG_CAPACITY: usize = 50;

/// Trajectory record of one model against one task pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelExecution {
    key: ExecutionKey,
    pub(crate) status: ExecutionStatus,
    pub(crate) graph: NavigationGraph,
    pub(crate) metrics: RunMetrics,
    pub(crate) outcome: Option<ExecutionOutcome>,
    /// Step indices already applied, used to drop redelivered steps.
    pub(crate) recorded_steps: BTreeSet<u32>,
}

impl ModelExecution {
    pub(crate) fn new(key: ExecutionKey, graph: NavigationGraph) -> Self {
        Self {
            key,
            status: ExecutionStatus::Running,
            graph,
            metrics: RunMetrics::default(),
            outcome: None,
            recorded_steps: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> &ExecutionKey {
        &self.key
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn graph(&self) -> &NavigationGraph {
        &self.graph
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn outcome(&self) -> Option<&ExecutionOutcome> {
        self.outcome.as_ref()
    }

    /// Highest step index applied so far.
    pub fn last_step(&self) -> Option<u32> {
        self.recorded_steps.last().copied()
    }
}

/// Bounded, lossy trail of human-readable log lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
}

impl LogBuffer {
    pub(crate) fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    pub(crate) run_id: Option<String>,
    pub(crate) connection: ConnectionState,
    pub(crate) pairs: Vec<TaskPair>,
    /// Model ids in announcement order.
    pub(crate) models: Vec<String>,
    pub(crate) executions: BTreeMap<ExecutionKey, ModelExecution>,
    pub(crate) active: Option<ExecutionKey>,
    pub(crate) selection: Selection,
    pub(crate) progress: Progress,
    pub(crate) summary: Option<RunSummary>,
    pub(crate) last_error: Option<String>,
    pub(crate) logs: LogBuffer,
}

impl RunState {
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn pairs(&self) -> &[TaskPair] {
        &self.pairs
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn execution(&self, key: &ExecutionKey) -> Option<&ModelExecution> {
        self.executions.get(key)
    }

    pub fn executions(&self) -> impl Iterator<Item = &ModelExecution> {
        self.executions.values()
    }

    pub fn active(&self) -> Option<&ExecutionKey> {
        self.active.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    /// Pair indices that may be selected: the declared pairs, or pair 0 for
    /// legacy runs that never declared any.
    pub fn pair_count(&self) -> usize {
        self.pairs.len().max(1)
    }

    pub(crate) fn remember_model(&mut self, model_id: &str) {
        if !self.models.iter().any(|m| m == model_id) {
            self.models.push(model_id.to_string());
        }
    }
}
