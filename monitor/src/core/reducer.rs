//! Notification-driven state transitions.
//!
//! `reduce` consumes one decoded notification in receipt order and derives the
//! next [`RunState`] in place. It performs no I/O, never blocks and never
//! fails: malformed or unexpected input leaves the state unchanged.
//!
//! The reducer owns execution and status bookkeeping only. Whether the view
//! follows a newly started or progressing execution is reported back as a
//! [`Follow`] hint and decided by [`crate::core::view::follow`].

use tracing::{debug, info};

use crate::core::graph::{NavigationGraph, StepVisit};
use crate::core::state::{ModelExecution, RunState};
use crate::core::types::{
    ExecutionKey, ExecutionOutcome, ExecutionStatus, NodeKind, Progress, Selection,
};
use crate::event::{
    ModelFinished, ModelStart, Notification, OutcomeStatus, RunCompleted, RunCreated, RunFailure,
    RunStart, Step, Stopped,
};

/// Auto-follow hint produced by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Follow {
    /// An execution started (or resumed running).
    Started(ExecutionKey),
    /// A live execution recorded a new step.
    Stepped(ExecutionKey),
}

/// What a single transition did, beyond mutating the state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reduction {
    /// The notification was dropped (unknown kind, stale run, redelivery of a
    /// run start) and should not produce a log line.
    pub ignored: bool,
    pub follow: Option<Follow>,
    /// Run id whose completion should arm the completion notifier.
    pub completed_run: Option<String>,
}

impl Reduction {
    fn ignored() -> Self {
        Self {
            ignored: true,
            ..Self::default()
        }
    }

    fn follow(follow: Follow) -> Self {
        Self {
            follow: Some(follow),
            ..Self::default()
        }
    }
}

/// Apply one notification to `state`.
pub fn reduce(state: &mut RunState, notification: &Notification) -> Reduction {
    if is_stale(state, notification) {
        debug!(
            kind = notification.kind(),
            run_id = ?notification.run_id(),
            current = ?state.run_id,
            "ignoring notification for another run"
        );
        return Reduction::ignored();
    }

    match notification {
        Notification::RunCreated(n) => on_run_created(state, n),
        Notification::RunStart(n) => on_run_start(state, n),
        Notification::ModelStart(n) => on_model_start(state, n),
        Notification::Step(n) => on_step(state, n),
        Notification::ModelComplete(n) | Notification::ModelFinal(n) => {
            on_model_finished(state, n)
        }
        Notification::Error(n) => on_error(state, n),
        Notification::ModelStopped(n) => on_model_stopped(state, n),
        Notification::RunStopped(_) => {
            state.active = None;
            Reduction::default()
        }
        Notification::RunCompleted(n) => on_run_completed(state, n),
        // Anomaly bookkeeping happens on `step`; these only feed the log trail.
        Notification::ReadyToStart(_)
        | Notification::Hallucination(_)
        | Notification::StopRequested(_) => Reduction::default(),
        Notification::Unknown { kind } => {
            debug!(kind = %kind, "ignoring unknown notification kind");
            Reduction::ignored()
        }
    }
}

fn is_stale(state: &RunState, notification: &Notification) -> bool {
    if matches!(notification, Notification::RunStart(_)) {
        return false;
    }
    match (state.run_id.as_deref(), notification.run_id()) {
        (Some(known), Some(run_id)) => known != run_id,
        _ => false,
    }
}

fn on_run_created(state: &mut RunState, n: &RunCreated) -> Reduction {
    if state.run_id.is_none() {
        state.run_id = Some(n.run_id.clone());
    }
    state.progress.declared_models = n.total_models;
    Reduction::default()
}

fn on_run_start(state: &mut RunState, n: &RunStart) -> Reduction {
    let same_run = state.run_id.as_deref() == Some(n.run_id.as_str());
    if same_run && !state.executions.is_empty() {
        debug!(run_id = %n.run_id, "run_start redelivered mid-run; keeping state");
        return Reduction::ignored();
    }

    let pairs = n.task_pairs();
    let models = n.models.clone().unwrap_or_default();
    let declared_models = if same_run {
        state.progress.declared_models
    } else {
        None
    };
    info!(
        run_id = %n.run_id,
        pairs = pairs.len(),
        total_models = n.total_models,
        "run started"
    );

    *state = RunState {
        run_id: Some(n.run_id.clone()),
        connection: state.connection,
        pairs,
        selection: Selection {
            model_id: models.first().cloned(),
            pair_index: 0,
        },
        models,
        progress: Progress {
            declared_models,
            total_models: n.total_models,
            current_model_index: None,
        },
        ..RunState::default()
    };
    Reduction::default()
}

fn on_model_start(state: &mut RunState, n: &ModelStart) -> Reduction {
    let pair_index = n.pair_index.unwrap_or(0);
    let key = ExecutionKey::new(n.model_id.clone(), pair_index);

    state.progress.total_models = state.progress.total_models.max(n.total_models);
    state.progress.current_model_index = Some(n.model_index);
    state.remember_model(&n.model_id);

    let existing = state.executions.get(&key).map(ModelExecution::status);
    match existing {
        Some(status) if status.is_terminal() => {
            debug!(
                model_id = %key.model_id,
                pair_index,
                "model_start redelivered for finished execution"
            );
            return Reduction::default();
        }
        Some(_) => {}
        None => {
            let start = state
                .pairs
                .get(pair_index)
                .map(|pair| pair.start_page.clone())
                .or_else(|| n.start_page.clone());
            let graph = start
                .as_deref()
                .map(NavigationGraph::seeded)
                .unwrap_or_default();
            state
                .executions
                .insert(key.clone(), ModelExecution::new(key.clone(), graph));
        }
    }

    info!(model_id = %key.model_id, pair_index, "model execution started");
    state.active = Some(key.clone());
    Reduction::follow(Follow::Started(key))
}

fn on_step(state: &mut RunState, n: &Step) -> Reduction {
    let data = &n.data;
    // Without an explicit pair a step only joins a running execution.
    let resolved = resolve_execution(state, &n.model_id, n.pair_index).filter(|key| {
        n.pair_index.is_some()
            || state
                .executions
                .get(key)
                .is_some_and(|e| e.status == ExecutionStatus::Running)
    });
    let key = match resolved {
        Some(key) => key,
        None => match synthesize_execution(state, n) {
            Some(key) => key,
            None => {
                debug!(
                    model_id = %n.model_id,
                    step = n.data.step,
                    "no pair left to place step; dropped"
                );
                return Reduction::default();
            }
        },
    };
    let Some(execution) = state.executions.get_mut(&key) else {
        return Reduction::default();
    };

    if execution.recorded_steps.contains(&data.step) {
        debug!(
            model_id = %key.model_id,
            pair_index = key.pair_index,
            step = data.step,
            "duplicate step ignored"
        );
        return Reduction::default();
    }

    let live = execution.last_step().is_none_or(|last| data.step > last);
    if !live {
        debug!(model_id = %key.model_id, step = data.step, "late step recorded behind current");
    }
    execution.graph.apply_step(
        StepVisit {
            step: data.step,
            page_title: &data.page_title,
            next_page_title: data.next_page_title.as_deref(),
            unresolved: data.is_404,
        },
        live,
    );
    execution.recorded_steps.insert(data.step);
    execution.metrics.visit_count = execution.metrics.visit_count.saturating_add(1);
    execution.metrics.elapsed_secs += data.llm_duration;
    if data.is_anomaly() {
        execution.metrics.anomaly_count = execution.metrics.anomaly_count.saturating_add(1);
    }

    Reduction::follow(Follow::Stepped(key))
}

/// Create an execution for a step that arrived before its `model_start`.
///
/// The step's own page seeds the start node. Without an explicit pair the step
/// goes to the selected pair, or, when the model already has an execution
/// there, to the pair after the model's latest one. Returns `None` when no
/// declared pair is free.
fn synthesize_execution(state: &mut RunState, n: &Step) -> Option<ExecutionKey> {
    let pair_index = match n.pair_index {
        Some(pair_index) => pair_index,
        None => synthesis_pair(state, &n.model_id)?,
    };
    let key = ExecutionKey::new(n.model_id.clone(), pair_index);
    debug!(
        model_id = %key.model_id,
        pair_index,
        page = %n.data.page_title,
        "step before model_start; synthesizing execution"
    );
    let graph = NavigationGraph::seeded(&n.data.page_title);
    state
        .executions
        .insert(key.clone(), ModelExecution::new(key.clone(), graph));
    state.remember_model(&n.model_id);
    state.active = Some(key.clone());
    Some(key)
}

fn synthesis_pair(state: &RunState, model_id: &str) -> Option<usize> {
    let selected = state.selection.pair_index;
    if !state
        .executions
        .contains_key(&ExecutionKey::new(model_id, selected))
    {
        return Some(selected);
    }
    let next = state
        .executions
        .keys()
        .filter(|key| key.model_id == model_id)
        .map(|key| key.pair_index)
        .max()?
        .checked_add(1)?;
    (next < state.pair_count()).then_some(next)
}

/// Locate the execution a model-scoped notification refers to.
///
/// An explicit pair wins. Otherwise: the active execution if it belongs to the
/// model, then the model's running execution on the highest pair, then the
/// model's execution on the selected pair.
fn resolve_execution(
    state: &RunState,
    model_id: &str,
    pair_index: Option<usize>,
) -> Option<ExecutionKey> {
    if let Some(pair_index) = pair_index {
        let key = ExecutionKey::new(model_id, pair_index);
        return state.executions.contains_key(&key).then_some(key);
    }
    if let Some(active) = &state.active
        && active.model_id == model_id
    {
        return Some(active.clone());
    }
    state
        .executions
        .values()
        .filter(|e| e.key().model_id == model_id && e.status == ExecutionStatus::Running)
        .map(|e| e.key().clone())
        .max_by_key(|key| key.pair_index)
        .or_else(|| {
            let key = ExecutionKey::new(model_id, state.selection.pair_index);
            state.executions.contains_key(&key).then_some(key)
        })
}

fn on_model_finished(state: &mut RunState, n: &ModelFinished) -> Reduction {
    let Some(key) = resolve_execution(state, &n.model_id, n.pair_index) else {
        debug!(model_id = %n.model_id, "completion for unknown execution ignored");
        return Reduction::default();
    };
    let metrics = n.data.metrics();
    let (status, kind) = match metrics.status {
        OutcomeStatus::Success => (ExecutionStatus::Completed, NodeKind::Target),
        _ => (ExecutionStatus::Failed, NodeKind::Failed),
    };

    if let Some(execution) = state.executions.get_mut(&key) {
        execution.status = status;
        execution.graph.finish_current(kind);
        execution.outcome = Some(ExecutionOutcome {
            reason: metrics.reason.clone(),
            total_steps: metrics.total_steps,
            total_duration: metrics.total_duration,
            hallucination_count: metrics.hallucination_count,
        });
    }
    info!(
        model_id = %key.model_id,
        pair_index = key.pair_index,
        status = ?status,
        "model execution finished"
    );
    clear_active_if(state, &key);
    Reduction::default()
}

fn on_error(state: &mut RunState, n: &RunFailure) -> Reduction {
    if let Some(key) = state.active.take()
        && let Some(execution) = state.executions.get_mut(&key)
    {
        execution.status = ExecutionStatus::Failed;
        execution.graph.finish_current(NodeKind::Failed);
    }
    state.last_error = Some(n.error.clone());
    Reduction::default()
}

fn on_model_stopped(state: &mut RunState, n: &Stopped) -> Reduction {
    let model_id = n
        .model_id
        .clone()
        .or_else(|| state.active.as_ref().map(|key| key.model_id.clone()))
        .or_else(|| state.selection.model_id.clone());
    let Some(model_id) = model_id else {
        return Reduction::default();
    };

    let named = ExecutionKey::new(
        model_id.clone(),
        n.pair_index.unwrap_or(state.selection.pair_index),
    );
    let key = if state.executions.contains_key(&named) {
        Some(named)
    } else {
        resolve_execution(state, &model_id, n.pair_index)
    };
    let Some(key) = key else {
        debug!(model_id = %model_id, "stop for unknown execution ignored");
        return Reduction::default();
    };

    if let Some(execution) = state.executions.get_mut(&key) {
        if execution.status == ExecutionStatus::Running {
            execution.status = ExecutionStatus::Failed;
        }
        execution.graph.demote_current();
    }
    clear_active_if(state, &key);
    Reduction::default()
}

fn on_run_completed(state: &mut RunState, n: &RunCompleted) -> Reduction {
    state.active = None;
    state.summary = Some(n.summary.clone());
    info!(run_id = %n.run_id, "run completed");
    Reduction {
        completed_run: Some(n.run_id.clone()),
        ..Reduction::default()
    }
}

fn clear_active_if(state: &mut RunState, key: &ExecutionKey) {
    if state.active.as_ref() == Some(key) {
        state.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{EdgeKind, TaskPair};
    use crate::test_support::{
        error, hallucinated_step, model_complete, model_final, model_start, model_stopped,
        not_found_step, run_completed, run_start, run_start_with_models, run_stopped, step,
    };

    fn apply(state: &mut RunState, notifications: &[Notification]) {
        for notification in notifications {
            reduce(state, notification);
        }
    }

    fn exec<'a>(state: &'a RunState, model: &str, pair: usize) -> &'a ModelExecution {
        state
            .execution(&ExecutionKey::new(model, pair))
            .expect("execution")
    }

    #[test]
    fn run_start_sets_pairs_and_resets_selection() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[
                run_start_with_models("r1", &[("A", "B"), ("C", "D")], &["m1", "m2"]),
                model_start("r1", "m2", 1, "C"),
            ],
        );
        assert_eq!(state.selection().pair_index, 0);

        reduce(&mut state, &run_start_with_models("r2", &[("E", "F")], &["m3"]));

        assert_eq!(state.run_id(), Some("r2"));
        assert_eq!(state.pairs(), &[TaskPair::new("E", "F")]);
        assert_eq!(state.executions().count(), 0);
        assert_eq!(state.selection().model_id.as_deref(), Some("m3"));
        assert_eq!(state.selection().pair_index, 0);
        assert!(state.active().is_none());
    }

    #[test]
    fn redelivered_run_start_keeps_executions() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[run_start("r1", &[("A", "B")]), model_start("r1", "m", 0, "A")],
        );

        let reduction = reduce(&mut state, &run_start("r1", &[("A", "B")]));

        assert!(reduction.ignored);
        assert_eq!(state.executions().count(), 1);
    }

    #[test]
    fn model_start_seeds_start_node_from_declared_pair() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[
                run_start("r1", &[("Paris", "Rome")]),
                model_start("r1", "m", 0, "ignored"),
            ],
        );

        let execution = exec(&state, "m", 0);
        let nodes: Vec<_> = execution.graph().nodes().collect();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].title, "Paris");
        assert_eq!(nodes[0].kind, NodeKind::Start);
        assert_eq!(execution.status(), ExecutionStatus::Running);
        assert_eq!(state.active(), Some(&ExecutionKey::new("m", 0)));
    }

    #[test]
    fn duplicate_step_is_idempotent() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[
                run_start("r1", &[("X", "Z")]),
                model_start("r1", "m", 0, "X"),
                step("r1", "m", 0, "X", Some("Y")),
            ],
        );
        let before = exec(&state, "m", 0).clone();

        let reduction = reduce(&mut state, &step("r1", "m", 0, "X", Some("Y")));

        assert_eq!(reduction.follow, None);
        assert_eq!(exec(&state, "m", 0), &before);
    }

    #[test]
    fn anomaly_increments_counter_without_moving() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[
                run_start("r1", &[("X", "Z")]),
                model_start("r1", "m", 0, "X"),
                hallucinated_step("r1", "m", 0, "X"),
            ],
        );

        let execution = exec(&state, "m", 0);
        assert_eq!(execution.metrics().anomaly_count, 1);
        assert_eq!(execution.metrics().visit_count, 1);
        assert!(execution.graph().edges().is_empty());
    }

    #[test]
    fn not_found_then_backtrack_is_recorded() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[
                run_start("r1", &[("X", "Z")]),
                model_start("r1", "m", 0, "X"),
                step("r1", "m", 0, "X", Some("Ghost")),
                not_found_step("r1", "m", 1, "Ghost"),
                step("r1", "m", 2, "X", Some("Y")),
            ],
        );

        let graph = exec(&state, "m", 0).graph();
        let kinds: Vec<_> = graph.edges().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EdgeKind::Normal, EdgeKind::Backtrack, EdgeKind::Normal]
        );
        assert_eq!(graph.node("ghost").expect("ghost").kind, NodeKind::Unresolved);
    }

    #[test]
    fn model_final_failure_marks_current_failed() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[
                run_start("r1", &[("X", "Z")]),
                model_start("r1", "m", 0, "X"),
                step("r1", "m", 0, "X", Some("Y")),
                model_final("r1", "m", None, OutcomeStatus::Failed),
            ],
        );

        let execution = exec(&state, "m", 0);
        assert_eq!(execution.status(), ExecutionStatus::Failed);
        assert_eq!(execution.graph().node("y").expect("y").kind, NodeKind::Failed);
        assert_eq!(
            execution.outcome().map(|o| o.reason.as_str()),
            Some("Max steps reached")
        );
        assert!(state.active().is_none());
    }

    #[test]
    fn completion_for_unknown_execution_is_noop() {
        let mut state = RunState::default();
        apply(&mut state, &[run_start("r1", &[("X", "Z")])]);
        let before = state.clone();

        reduce(
            &mut state,
            &model_complete("r1", "ghost", Some(0), OutcomeStatus::Success),
        );

        assert_eq!(state, before);
    }

    #[test]
    fn redelivered_model_start_after_completion_is_noop() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[
                run_start("r1", &[("X", "Z")]),
                model_start("r1", "m", 0, "X"),
                model_complete("r1", "m", Some(0), OutcomeStatus::Success),
            ],
        );

        let reduction = reduce(&mut state, &model_start("r1", "m", 0, "X"));

        assert_eq!(reduction.follow, None);
        assert_eq!(exec(&state, "m", 0).status(), ExecutionStatus::Completed);
        assert!(state.active().is_none());
    }

    #[test]
    fn model_stopped_without_pair_uses_selected_pair() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[
                run_start("r1", &[("X", "Z")]),
                model_start("r1", "m", 0, "X"),
                step("r1", "m", 0, "X", Some("Y")),
                model_stopped("r1", Some("m"), None),
            ],
        );

        let execution = exec(&state, "m", 0);
        assert_eq!(execution.status(), ExecutionStatus::Failed);
        assert_eq!(execution.graph().node("y").expect("y").kind, NodeKind::Visited);
        assert!(execution.graph().current().is_none());
        assert!(state.active().is_none());
    }

    #[test]
    fn model_stopped_without_model_fails_active_execution() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[
                run_start("r1", &[("X", "Z"), ("P", "Q")]),
                model_start("r1", "m", 1, "P"),
                step("r1", "m", 0, "P", Some("R")),
            ],
        );
        state.selection.pair_index = 0;

        reduce(&mut state, &model_stopped("r1", None, None));

        let execution = exec(&state, "m", 1);
        assert_eq!(execution.status(), ExecutionStatus::Failed);
        assert_eq!(execution.graph().node("r").expect("r").kind, NodeKind::Visited);
        assert!(execution.graph().current().is_none());
        assert!(state.active().is_none());
    }

    #[test]
    fn step_after_completion_does_not_join_finished_execution() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[
                run_start("r1", &[("A", "B"), ("C", "D")]),
                model_start("r1", "m", 0, "A"),
                step("r1", "m", 0, "A", Some("B")),
                model_complete("r1", "m", Some(0), OutcomeStatus::Success),
            ],
        );
        let finished = exec(&state, "m", 0).graph().clone();

        let reduction = reduce(&mut state, &step("r1", "m", 0, "C", Some("E")));
        assert!(!reduction.ignored);

        let completed = exec(&state, "m", 0);
        assert_eq!(completed.status(), ExecutionStatus::Completed);
        assert_eq!(completed.graph(), &finished);

        let fresh = exec(&state, "m", 1);
        assert_eq!(fresh.status(), ExecutionStatus::Running);
        assert_eq!(fresh.graph().node("c").expect("c").kind, NodeKind::Start);
        assert_eq!(fresh.metrics().visit_count, 1);
        assert_eq!(state.active(), Some(&ExecutionKey::new("m", 1)));
    }

    #[test]
    fn step_without_free_pair_is_dropped() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[
                run_start("r1", &[("A", "B")]),
                model_start("r1", "m", 0, "A"),
                model_complete("r1", "m", Some(0), OutcomeStatus::Success),
            ],
        );

        let before = state.clone();

        let reduction = reduce(&mut state, &step("r1", "m", 3, "C", Some("E")));

        assert_eq!(reduction.follow, None);
        assert_eq!(state, before);
    }

    #[test]
    fn run_stopped_and_error_clear_active_marker() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[
                run_start("r1", &[("X", "Z")]),
                model_start("r1", "m", 0, "X"),
                run_stopped("r1"),
            ],
        );
        assert!(state.active().is_none());

        reduce(&mut state, &error("r1", "boom"));
        assert_eq!(state.last_error(), Some("boom"));
        // No active execution: the error does not touch m.
        assert_eq!(exec(&state, "m", 0).status(), ExecutionStatus::Running);
    }

    #[test]
    fn notifications_for_other_runs_are_ignored() {
        let mut state = RunState::default();
        apply(&mut state, &[run_start("r1", &[("X", "Z")])]);

        let reduction = reduce(&mut state, &model_start("r0", "m", 0, "X"));

        assert!(reduction.ignored);
        assert_eq!(state.executions().count(), 0);
    }

    #[test]
    fn run_completed_reports_run_id_and_clears_active() {
        let mut state = RunState::default();
        apply(
            &mut state,
            &[run_start("r1", &[("X", "Z")]), model_start("r1", "m", 0, "X")],
        );

        let reduction = reduce(&mut state, &run_completed("r1"));

        assert_eq!(reduction.completed_run.as_deref(), Some("r1"));
        assert!(state.active().is_none());
        assert_eq!(state.summary().map(|s| s.completed), Some(1));
    }

    #[test]
    fn unknown_kind_leaves_state_unchanged() {
        let mut state = RunState::default();
        apply(&mut state, &[run_start("r1", &[("X", "Z")])]);
        let before = state.clone();

        let reduction = reduce(
            &mut state,
            &Notification::Unknown {
                kind: "heartbeat".to_string(),
            },
        );

        assert!(reduction.ignored);
        assert_eq!(state, before);
    }
}
