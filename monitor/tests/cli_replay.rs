//! CLI tests for `monitor replay` and `monitor check-config`.
//!
//! Spawns the monitor binary against fixture files written to a temp dir.

use std::fs;
use std::process::Command;

use monitor::test_support::{tempdir, write_feed};
use serde_json::Value;

#[test]
fn replay_prints_snapshot_json() {
    let temp = tempdir();
    let path = write_feed(
        temp.path(),
        &[
            r#"{"type":"run_start","run_id":"r1","total_models":1,"start_page":"X","target_page":"Z"}"#,
            r#"{"type":"model_start","run_id":"r1","model_id":"m","pair_index":0,"start_page":"X","target_page":"Z"}"#,
            r#"{"type":"step","run_id":"r1","model_id":"m","data":{"step":0,"page_title":"X","next_page_title":"Z"}}"#,
            r#"{"type":"model_complete","run_id":"r1","model_id":"m","data":{"model":"m","metrics":{"status":"success","reason":"Target reached","total_steps":1,"total_duration":0.5,"hallucination_count":0},"steps":[]}}"#,
        ],
    );

    let output = Command::new(env!("CARGO_BIN_EXE_monitor"))
        .arg("replay")
        .arg(&path)
        .output()
        .expect("monitor replay");

    assert!(output.status.success());
    let snapshot: Value = serde_json::from_slice(&output.stdout).expect("snapshot json");
    assert_eq!(snapshot["run_id"], "r1");
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["nodes"].as_array().map(Vec::len), Some(2));
}

#[test]
fn check_config_rejects_invalid_file() {
    let temp = tempdir();
    let path = temp.path().join("monitor.toml");
    fs::write(&path, "queue_capacity = 0\n").expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_monitor"))
        .arg("check-config")
        .arg(&path)
        .output()
        .expect("monitor check-config");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("queue_capacity"));
}
