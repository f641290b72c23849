//! View selection: which execution's trajectory is surfaced to the viewer.
//!
//! `select_model` and `select_pair` are the viewer's explicit commands;
//! `follow` applies the auto-follow policy to hints emitted by the reducer.
//! None of these touch execution history.

use tracing::debug;

use crate::core::reducer::Follow;
use crate::core::state::{ModelExecution, RunState};
use crate::core::types::{ExecutionKey, TaskPair};

/// Show `model_id` on the currently selected pair.
///
/// If that model never ran against the pair, the displayed graph is empty.
pub fn select_model(state: &mut RunState, model_id: &str) {
    debug!(model_id, pair_index = state.selection.pair_index, "viewer selected model");
    state.selection.model_id = Some(model_id.to_string());
}

/// Show the currently selected model on `pair_index`.
///
/// Out-of-range indices are ignored.
pub fn select_pair(state: &mut RunState, pair_index: usize) {
    if pair_index >= state.pair_count() {
        debug!(pair_index, pairs = state.pairs.len(), "pair selection out of range");
        return;
    }
    debug!(pair_index, "viewer selected pair");
    state.selection.pair_index = pair_index;
}

/// Apply the auto-follow policy for a reducer hint.
///
/// - A started execution is followed only when its pair is at or beyond the
///   selected pair; the view never jumps backward over a pair the viewer may
///   still be reviewing.
/// - A step from the active execution on the selected pair pulls the view back
///   to that model, even after the viewer switched to another model.
pub fn follow(state: &mut RunState, hint: &Follow) {
    match hint {
        Follow::Started(key) => {
            if key.pair_index >= state.selection.pair_index && key.pair_index < state.pair_count()
            {
                state.selection.model_id = Some(key.model_id.clone());
                state.selection.pair_index = key.pair_index;
            }
        }
        Follow::Stepped(key) => {
            if state.active.as_ref() == Some(key) && key.pair_index == state.selection.pair_index
            {
                state.selection.model_id = Some(key.model_id.clone());
            }
        }
    }
}

/// The selected execution, if the selected model ran on the selected pair.
pub fn displayed(state: &RunState) -> Option<&ModelExecution> {
    state
        .selection
        .key()
        .and_then(|key| state.executions.get(&key))
}

/// The task pair currently selected for display.
pub fn displayed_pair(state: &RunState) -> Option<&TaskPair> {
    state.pairs.get(state.selection.pair_index)
}

/// Whether the view currently tracks the active execution.
pub fn is_live(state: &RunState) -> bool {
    match (&state.active, state.selection.key()) {
        (Some(active), Some(selected)) => *active == selected,
        _ => false,
    }
}

/// Key of the execution the viewer would see, regardless of whether it exists.
pub fn selected_key(state: &RunState) -> Option<ExecutionKey> {
    state.selection.key()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reducer::reduce;
    use crate::event::Notification;
    use crate::test_support::{model_start, run_start, step};

    fn drive(state: &mut RunState, notifications: &[Notification]) {
        for notification in notifications {
            let reduction = reduce(state, notification);
            if let Some(hint) = &reduction.follow {
                follow(state, hint);
            }
        }
    }

    fn two_pair_run() -> RunState {
        let mut state = RunState::default();
        drive(&mut state, &[run_start("r1", &[("A", "B"), ("C", "D")])]);
        state
    }

    #[test]
    fn forward_model_start_is_followed() {
        let mut state = two_pair_run();
        drive(
            &mut state,
            &[model_start("r1", "A1", 0, "A"), model_start("r1", "B1", 1, "C")],
        );

        assert_eq!(selected_key(&state), Some(ExecutionKey::new("B1", 1)));
    }

    #[test]
    fn backward_model_start_is_not_followed() {
        let mut state = two_pair_run();
        drive(
            &mut state,
            &[model_start("r1", "B1", 1, "C"), model_start("r1", "A1", 0, "A")],
        );

        assert_eq!(selected_key(&state), Some(ExecutionKey::new("B1", 1)));
    }

    #[test]
    fn live_step_pulls_view_back_to_active_model() {
        let mut state = two_pair_run();
        drive(&mut state, &[model_start("r1", "m1", 0, "A")]);
        select_model(&mut state, "m2");
        assert!(displayed(&state).is_none());
        assert!(!is_live(&state));

        drive(&mut state, &[step("r1", "m1", 0, "A", Some("X"))]);

        assert_eq!(selected_key(&state), Some(ExecutionKey::new("m1", 0)));
        assert!(is_live(&state));
    }

    #[test]
    fn step_on_other_pair_does_not_move_view() {
        let mut state = two_pair_run();
        drive(&mut state, &[model_start("r1", "m1", 1, "C")]);
        select_pair(&mut state, 0);

        drive(&mut state, &[step("r1", "m1", 0, "C", Some("X"))]);

        assert_eq!(state.selection().pair_index, 0);
    }

    #[test]
    fn select_pair_ignores_out_of_range() {
        let mut state = two_pair_run();
        select_pair(&mut state, 5);
        assert_eq!(state.selection().pair_index, 0);

        select_pair(&mut state, 1);
        assert_eq!(state.selection().pair_index, 1);
        assert_eq!(displayed_pair(&state), Some(&TaskPair::new("C", "D")));
    }

    #[test]
    fn select_pair_falls_back_to_empty_when_model_never_ran() {
        let mut state = two_pair_run();
        drive(&mut state, &[model_start("r1", "m1", 0, "A")]);

        select_pair(&mut state, 1);

        assert!(displayed(&state).is_none());
        select_pair(&mut state, 0);
        assert!(displayed(&state).is_some());
    }
}
