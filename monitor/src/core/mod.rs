//! Deterministic, pure logic shared by the monitor.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod graph;
pub mod recorder;
pub mod reducer;
pub mod snapshot;
pub mod state;
pub mod types;
pub mod view;
