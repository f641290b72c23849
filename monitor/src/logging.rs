//! Tracing setup for the `monitor` CLI.
//!
//! Two outputs never mix. Tracing events from the reducer, ingestor and feed
//! reader carry `run_id`, `model_id`, `pair_index` and `step` fields and go to
//! stderr under `RUST_LOG`. The viewer-facing activity trail is built by
//! `core::recorder` into the run state and ends up in the replayed snapshot on
//! stdout, whatever the filter says. The `monitor-ui` server installs its own
//! subscriber defaulting to `monitor_ui=info`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Directives used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_DIRECTIVES: &str = "warn";

/// Filter from `RUST_LOG`, falling back to `default_directives`.
pub fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Install the stderr subscriber used by the CLI.
///
/// ```bash
/// RUST_LOG=monitor::core::reducer=debug monitor replay feed.jsonl
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_DIRECTIVES))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_directives_apply_without_env() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let filter = env_filter("monitor=debug");
        assert_eq!(filter.to_string(), "monitor=debug");
    }
}
