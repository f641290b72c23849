//! Live-run monitoring state for benchmark runs.
//!
//! A benchmark run executes several models over one or more (start, target)
//! page pairs and streams notifications as it goes. This crate rebuilds, from
//! that stream, what a dashboard needs to show: per-execution navigation
//! graphs, progress, a bounded activity log and the viewer's selection.
//!
//! - **[`core`]**: Pure, deterministic state reconstruction (reducer, view
//!   selector, log recorder, snapshots). No I/O, no clocks.
//! - **[`io`]**: Config files and the JSONL notification feed.
//!
//! [`engine::Monitor`] ties the core together per notification, [`ingest`]
//! serializes commands from many producers onto one writer, and
//! [`completion`] fires the post-run callback.

pub mod completion;
pub mod core;
pub mod engine;
pub mod event;
pub mod ingest;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
