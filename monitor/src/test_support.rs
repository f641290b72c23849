//! Test-only builders for constructing notifications.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::core::types::{RunSummary, TaskPair};
use crate::event::{
    Hallucination, HallucinationData, ModelFinished, ModelMetrics, ModelReport, ModelStart,
    Notice, Notification, OutcomeStatus, RunCompleted, RunCreated, RunFailure, RunStart, Step,
    StepData, Stopped,
};

/// Deterministic wall-clock instant for log entries.
pub fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

pub fn run_created(run_id: &str, total_models: Option<usize>) -> Notification {
    Notification::RunCreated(RunCreated {
        run_id: run_id.to_string(),
        total_models,
        message: None,
    })
}

pub fn ready_to_start(run_id: &str) -> Notification {
    Notification::ReadyToStart(Notice {
        run_id: run_id.to_string(),
        message: "All models loaded".to_string(),
    })
}

/// `run_start` declaring one pair per `(start, target)` tuple.
pub fn run_start(run_id: &str, pairs: &[(&str, &str)]) -> Notification {
    run_start_with_models(run_id, pairs, &[])
}

/// `run_start` that also announces the ordered model list.
pub fn run_start_with_models(
    run_id: &str,
    pairs: &[(&str, &str)],
    models: &[&str],
) -> Notification {
    Notification::RunStart(RunStart {
        run_id: run_id.to_string(),
        total_models: models.len(),
        pairs: Some(
            pairs
                .iter()
                .map(|(start, target)| TaskPair::new(*start, *target))
                .collect(),
        ),
        start_page: None,
        target_page: None,
        models: (!models.is_empty()).then(|| models.iter().map(|m| m.to_string()).collect()),
    })
}

pub fn model_start(run_id: &str, model_id: &str, pair_index: usize, start: &str) -> Notification {
    Notification::ModelStart(ModelStart {
        run_id: run_id.to_string(),
        model_id: model_id.to_string(),
        model_index: 0,
        total_models: 1,
        pair_index: Some(pair_index),
        start_page: Some(start.to_string()),
        target_page: None,
    })
}

/// Step data whose proposed concept resolves to `next` through the mapping.
pub fn step_data(step: u32, page: &str, next: Option<&str>) -> StepData {
    let mut mapping = BTreeMap::new();
    let concept = next.map(|next| {
        let id = format!("c{step}");
        mapping.insert(id.clone(), next.to_string());
        id
    });
    StepData {
        step,
        page_title: page.to_string(),
        next_page_title: next.map(str::to_string),
        llm_duration: 1.5,
        next_concept_id: concept,
        mapping,
        available_concepts_count: None,
        parsing_method: None,
        confidence: None,
        intuition: None,
        is_hallucination: false,
        is_404: false,
        is_final_target: false,
    }
}

pub fn step(
    run_id: &str,
    model_id: &str,
    step: u32,
    page: &str,
    next: Option<&str>,
) -> Notification {
    step_with(run_id, model_id, step_data(step, page, next))
}

pub fn step_with(run_id: &str, model_id: &str, data: StepData) -> Notification {
    Notification::Step(Step {
        run_id: run_id.to_string(),
        model_id: model_id.to_string(),
        pair_index: None,
        data,
    })
}

/// Step whose proposed concept id is missing from the mapping.
pub fn hallucinated_step(run_id: &str, model_id: &str, step: u32, page: &str) -> Notification {
    let mut data = step_data(step, page, None);
    data.next_concept_id = Some("bogus".to_string());
    data.mapping.insert("c1".to_string(), "Elsewhere".to_string());
    step_with(run_id, model_id, data)
}

/// Step reporting that `page` could not be fetched.
pub fn not_found_step(run_id: &str, model_id: &str, step: u32, page: &str) -> Notification {
    let mut data = step_data(step, page, None);
    data.is_404 = true;
    data.llm_duration = 0.0;
    step_with(run_id, model_id, data)
}

pub fn hallucination(run_id: &str, model_id: &str, step: u32, page: &str) -> Notification {
    Notification::Hallucination(Hallucination {
        run_id: run_id.to_string(),
        model_id: model_id.to_string(),
        data: HallucinationData {
            step,
            page_title: page.to_string(),
            invalid_concept_id: Some("bogus".to_string()),
            available_concepts: vec!["c1".to_string()],
            retry_number: 1,
            max_retries: 3,
        },
    })
}

fn finished(
    run_id: &str,
    model_id: &str,
    pair_index: Option<usize>,
    status: OutcomeStatus,
) -> ModelFinished {
    ModelFinished {
        run_id: run_id.to_string(),
        model_id: model_id.to_string(),
        pair_index,
        data: ModelReport::Flat(ModelMetrics {
            status,
            reason: match status {
                OutcomeStatus::Success => "Target reached".to_string(),
                _ => "Max steps reached".to_string(),
            },
            total_steps: 2,
            total_duration: 3.0,
            hallucination_count: 0,
        }),
    }
}

pub fn model_complete(
    run_id: &str,
    model_id: &str,
    pair_index: Option<usize>,
    status: OutcomeStatus,
) -> Notification {
    Notification::ModelComplete(finished(run_id, model_id, pair_index, status))
}

pub fn model_final(
    run_id: &str,
    model_id: &str,
    pair_index: Option<usize>,
    status: OutcomeStatus,
) -> Notification {
    Notification::ModelFinal(finished(run_id, model_id, pair_index, status))
}

pub fn error(run_id: &str, message: &str) -> Notification {
    Notification::Error(RunFailure {
        run_id: run_id.to_string(),
        error: message.to_string(),
    })
}

pub fn stop_requested(run_id: &str) -> Notification {
    Notification::StopRequested(Notice {
        run_id: run_id.to_string(),
        message: "Stop request received".to_string(),
    })
}

pub fn model_stopped(
    run_id: &str,
    model_id: Option<&str>,
    pair_index: Option<usize>,
) -> Notification {
    Notification::ModelStopped(Stopped {
        run_id: run_id.to_string(),
        message: "stopped by user".to_string(),
        model_id: model_id.map(str::to_string),
        pair_index,
    })
}

pub fn run_stopped(run_id: &str) -> Notification {
    Notification::RunStopped(Stopped {
        run_id: run_id.to_string(),
        message: "Benchmark stopped by user".to_string(),
        model_id: None,
        pair_index: None,
    })
}

pub fn run_completed(run_id: &str) -> Notification {
    Notification::RunCompleted(RunCompleted {
        run_id: run_id.to_string(),
        message: "Benchmark completed: 1 succeeded, 0 failed".to_string(),
        summary: RunSummary {
            total_models: 1,
            models: vec!["m".to_string()],
            completed: 1,
            failed: 0,
        },
    })
}

/// Write `lines` to a fresh JSONL file inside `dir`.
pub fn write_feed(dir: &std::path::Path, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join("feed.jsonl");
    let mut body = lines.join("\n");
    body.push('\n');
    std::fs::write(&path, body).unwrap_or_else(|e| panic!("write {}: {e}", path.display()));
    path
}

/// Temporary directory for feed and config fixtures.
pub fn tempdir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"))
}
