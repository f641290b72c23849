//! One-shot notification fired when a run completes successfully.
//!
//! After `run_completed` the notifier waits a fixed settle delay and then
//! hands the run id to a caller-supplied callback (typically navigation to the
//! archived run). Redelivered completions of the run last armed are ignored;
//! stale runs never reach the notifier because the reducer drops them. Pending
//! timers are owned by the notifier and aborted when it is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delay between `run_completed` and the callback.
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

pub type CompletionCallback = Arc<dyn Fn(String) + Send + Sync>;

pub struct CompletionNotifier {
    callback: Option<CompletionCallback>,
    last_armed: Option<String>,
    pending: Vec<JoinHandle<()>>,
}

impl CompletionNotifier {
    pub fn new(callback: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
            last_armed: None,
            pending: Vec::new(),
        }
    }

    /// Notifier with no callback; arming is a no-op.
    pub fn disabled() -> Self {
        Self {
            callback: None,
            last_armed: None,
            pending: Vec::new(),
        }
    }

    /// Schedule the callback for `run_id`.
    ///
    /// Returns false when nothing was scheduled: no callback, `run_id` is the
    /// run last armed, or there is no tokio runtime to run the timer on. Arming
    /// a new run leaves earlier timers running.
    pub fn arm(&mut self, run_id: &str) -> bool {
        let Some(callback) = &self.callback else {
            debug!(run_id, "completion callback not configured");
            return false;
        };
        if self.last_armed.as_deref() == Some(run_id) {
            debug!(run_id, "completion already armed");
            return false;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!(run_id, "no async runtime; completion callback skipped");
            return false;
        };

        self.last_armed = Some(run_id.to_string());
        self.pending.retain(|task| !task.is_finished());

        let callback = Arc::clone(callback);
        let run_id = run_id.to_string();
        self.pending.push(runtime.spawn(async move {
            tokio::time::sleep(SETTLE_DELAY).await;
            info!(run_id = %run_id, "run settled, firing completion callback");
            callback(run_id);
        }));
        true
    }

    /// Abort every timer that has not fired yet.
    pub fn cancel_all(&mut self) {
        for task in self.pending.drain(..) {
            task.abort();
        }
    }

    /// Timers scheduled and not yet finished.
    pub fn pending(&self) -> usize {
        self.pending.iter().filter(|task| !task.is_finished()).count()
    }
}

impl Drop for CompletionNotifier {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl std::fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionNotifier")
            .field("enabled", &self.callback.is_some())
            .field("last_armed", &self.last_armed)
            .field("pending", &self.pending.len())
            .finish()
    }
}
