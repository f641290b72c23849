//! Read-only projection of [`RunState`] for the rendering layer.

use serde::Serialize;

use crate::core::graph::{GraphEdge, GraphNode};
use crate::core::state::RunState;
use crate::core::types::{
    ConnectionState, ExecutionKey, ExecutionOutcome, ExecutionStatus, LogEntry, RunMetrics,
    RunSummary, Selection,
};
use crate::core::view;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressView {
    pub declared_models: Option<usize>,
    pub total_models: usize,
    pub total_pairs: usize,
    pub current_model_index: Option<usize>,
    pub started: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub model_id: String,
    pub pair_index: usize,
    pub status: ExecutionStatus,
    pub metrics: RunMetrics,
    pub node_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub run_id: Option<String>,
    pub connection: ConnectionState,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub logs: Vec<LogEntry>,
    pub active_model_id: Option<String>,
    pub active: Option<ExecutionKey>,
    pub selection: Selection,
    /// The selection tracks the active execution.
    pub live: bool,
    pub start_label: Option<String>,
    pub target_label: Option<String>,
    pub status: Option<ExecutionStatus>,
    pub outcome: Option<ExecutionOutcome>,
    pub metrics: RunMetrics,
    pub progress: ProgressView,
    pub models: Vec<String>,
    pub executions: Vec<ExecutionSummary>,
    pub summary: Option<RunSummary>,
    pub last_error: Option<String>,
}

impl Snapshot {
    pub fn capture(state: &RunState) -> Self {
        let displayed = view::displayed(state);
        let pair = view::displayed_pair(state);

        let (nodes, edges, metrics, status, outcome) = match displayed {
            Some(execution) => (
                execution.graph().nodes().cloned().collect(),
                execution.graph().edges().to_vec(),
                execution.metrics().clone(),
                Some(execution.status()),
                execution.outcome().cloned(),
            ),
            None => (Vec::new(), Vec::new(), RunMetrics::default(), None, None),
        };

        let executions: Vec<ExecutionSummary> = state
            .executions()
            .map(|e| ExecutionSummary {
                model_id: e.key().model_id.clone(),
                pair_index: e.key().pair_index,
                status: e.status(),
                metrics: e.metrics().clone(),
                node_count: e.graph().len(),
            })
            .collect();
        let count = |status: ExecutionStatus| {
            executions.iter().filter(|e| e.status == status).count()
        };
        let progress = ProgressView {
            declared_models: state.progress().declared_models,
            total_models: state.progress().total_models,
            total_pairs: state.pairs().len(),
            current_model_index: state.progress().current_model_index,
            started: executions.len(),
            running: count(ExecutionStatus::Running),
            completed: count(ExecutionStatus::Completed),
            failed: count(ExecutionStatus::Failed),
        };

        Self {
            run_id: state.run_id().map(str::to_string),
            connection: state.connection(),
            nodes,
            edges,
            logs: state.logs().iter().cloned().collect(),
            active_model_id: state.active().map(|key| key.model_id.clone()),
            active: state.active().cloned(),
            selection: state.selection().clone(),
            live: view::is_live(state),
            start_label: pair.map(|p| p.start_page.clone()),
            target_label: pair.map(|p| p.target_page.clone()),
            status,
            outcome,
            metrics,
            progress,
            models: state.models().to_vec(),
            executions,
            summary: state.summary().cloned(),
            last_error: state.last_error().map(str::to_string),
        }
    }
}
