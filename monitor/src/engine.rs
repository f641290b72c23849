//! The `Monitor` facade: one entry point per inbound command.
//!
//! Every notification goes through the reducer, then the auto-follow policy,
//! then the log recorder, and finally arms the completion notifier when the
//! run completed. Viewer commands go straight to the view selector.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::completion::CompletionNotifier;
use crate::core::reducer::{Reduction, reduce};
use crate::core::snapshot::Snapshot;
use crate::core::state::RunState;
use crate::core::types::ConnectionState;
use crate::core::{recorder, view};
use crate::event::Notification;

#[derive(Debug)]
pub struct Monitor {
    state: RunState,
    notifier: CompletionNotifier,
}

impl Monitor {
    pub fn new(notifier: CompletionNotifier) -> Self {
        Self {
            state: RunState::default(),
            notifier,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn apply(&mut self, notification: &Notification) -> Reduction {
        self.apply_at(notification, Utc::now())
    }

    /// Apply a notification, stamping its log line with `at`.
    pub fn apply_at(&mut self, notification: &Notification, at: DateTime<Utc>) -> Reduction {
        let reduction = reduce(&mut self.state, notification);
        trace!(kind = notification.kind(), ?reduction, "notification reduced");
        if reduction.ignored {
            return reduction;
        }
        if let Some(hint) = &reduction.follow {
            view::follow(&mut self.state, hint);
        }
        recorder::record(&mut self.state, notification, at);
        if let Some(run_id) = &reduction.completed_run {
            self.notifier.arm(run_id);
        }
        reduction
    }

    pub fn select_model(&mut self, model_id: &str) {
        view::select_model(&mut self.state, model_id);
    }

    pub fn select_pair(&mut self, pair_index: usize) {
        view::select_pair(&mut self.state, pair_index);
    }

    /// Record the transport's connection state. Run state is left untouched.
    pub fn set_connection(&mut self, connection: ConnectionState) {
        self.state.connection = connection;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.state)
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(CompletionNotifier::disabled())
    }
}
