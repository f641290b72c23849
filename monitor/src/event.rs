//! Decoded progress notifications for a benchmark run.
//!
//! Notifications arrive as JSON objects with a `type` discriminator. Known
//! kinds decode into a dedicated payload; unknown kinds decode into
//! [`Notification::Unknown`] so the caller can log and skip them.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::core::types::{RunSummary, TaskPair};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    RunCreated(RunCreated),
    ReadyToStart(Notice),
    RunStart(RunStart),
    ModelStart(ModelStart),
    Step(Step),
    Hallucination(Hallucination),
    ModelComplete(ModelFinished),
    ModelFinal(ModelFinished),
    Error(RunFailure),
    StopRequested(Notice),
    ModelStopped(Stopped),
    RunStopped(Stopped),
    RunCompleted(RunCompleted),
    /// A `type` this monitor does not know about.
    #[serde(skip_deserializing)]
    Unknown { kind: String },
}

impl Notification {
    /// Wire names of every kind [`decode`] routes to a typed payload.
    pub const KINDS: &'static [&'static str] = &[
        "run_created",
        "ready_to_start",
        "run_start",
        "model_start",
        "step",
        "hallucination",
        "model_complete",
        "model_final",
        "error",
        "stop_requested",
        "model_stopped",
        "run_stopped",
        "run_completed",
    ];

    /// Wire name of this notification.
    pub fn kind(&self) -> &str {
        match self {
            Notification::RunCreated(_) => "run_created",
            Notification::ReadyToStart(_) => "ready_to_start",
            Notification::RunStart(_) => "run_start",
            Notification::ModelStart(_) => "model_start",
            Notification::Step(_) => "step",
            Notification::Hallucination(_) => "hallucination",
            Notification::ModelComplete(_) => "model_complete",
            Notification::ModelFinal(_) => "model_final",
            Notification::Error(_) => "error",
            Notification::StopRequested(_) => "stop_requested",
            Notification::ModelStopped(_) => "model_stopped",
            Notification::RunStopped(_) => "run_stopped",
            Notification::RunCompleted(_) => "run_completed",
            Notification::Unknown { kind } => kind.as_str(),
        }
    }

    pub fn run_id(&self) -> Option<&str> {
        let run_id = match self {
            Notification::RunCreated(n) => &n.run_id,
            Notification::ReadyToStart(n) | Notification::StopRequested(n) => &n.run_id,
            Notification::RunStart(n) => &n.run_id,
            Notification::ModelStart(n) => &n.run_id,
            Notification::Step(n) => &n.run_id,
            Notification::Hallucination(n) => &n.run_id,
            Notification::ModelComplete(n) | Notification::ModelFinal(n) => &n.run_id,
            Notification::Error(n) => &n.run_id,
            Notification::ModelStopped(n) | Notification::RunStopped(n) => &n.run_id,
            Notification::RunCompleted(n) => &n.run_id,
            Notification::Unknown { .. } => return None,
        };
        Some(run_id)
    }
}

/// Decode one JSON notification.
///
/// Unknown `type` values are not an error. Malformed JSON, a missing `type`,
/// or a known kind with missing required fields is.
pub fn decode(raw: &str) -> Result<Notification, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;
    if let Some(kind) = value.get("type").and_then(Value::as_str)
        && !Notification::KINDS.contains(&kind)
    {
        return Ok(Notification::Unknown {
            kind: kind.to_string(),
        });
    }
    serde_json::from_value(value)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunCreated {
    pub run_id: String,
    #[serde(default)]
    pub total_models: Option<usize>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Payload shared by message-only kinds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notice {
    pub run_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunStart {
    pub run_id: String,
    #[serde(default)]
    pub total_models: usize,
    #[serde(default)]
    pub pairs: Option<Vec<TaskPair>>,
    #[serde(default)]
    pub start_page: Option<String>,
    #[serde(default)]
    pub target_page: Option<String>,
    /// Ordered model ids, when the engine announces them up front.
    #[serde(default)]
    pub models: Option<Vec<String>>,
}

impl RunStart {
    /// Declared task pairs, falling back to the single bare pair.
    pub fn task_pairs(&self) -> Vec<TaskPair> {
        if let Some(pairs) = &self.pairs
            && !pairs.is_empty()
        {
            return pairs.clone();
        }
        match (&self.start_page, &self.target_page) {
            (Some(start), Some(target)) => vec![TaskPair::new(start.clone(), target.clone())],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelStart {
    pub run_id: String,
    pub model_id: String,
    #[serde(default)]
    pub model_index: usize,
    #[serde(default)]
    pub total_models: usize,
    #[serde(default)]
    pub pair_index: Option<usize>,
    #[serde(default)]
    pub start_page: Option<String>,
    #[serde(default)]
    pub target_page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Step {
    pub run_id: String,
    pub model_id: String,
    #[serde(default)]
    pub pair_index: Option<usize>,
    pub data: StepData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepData {
    pub step: u32,
    pub page_title: String,
    #[serde(default)]
    pub next_page_title: Option<String>,
    #[serde(default)]
    pub llm_duration: f64,
    #[serde(default)]
    pub next_concept_id: Option<String>,
    /// Concept id to resource title, as offered to the model.
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub available_concepts_count: Option<usize>,
    #[serde(default)]
    pub parsing_method: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub intuition: Option<String>,
    #[serde(default)]
    pub is_hallucination: bool,
    #[serde(default)]
    pub is_404: bool,
    #[serde(default)]
    pub is_final_target: bool,
}

impl StepData {
    /// The model proposed a concept that is not in the offered mapping.
    pub fn is_anomaly(&self) -> bool {
        if self.is_hallucination {
            return true;
        }
        self.next_concept_id
            .as_ref()
            .is_some_and(|id| !self.mapping.contains_key(id))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Hallucination {
    pub run_id: String,
    pub model_id: String,
    pub data: HallucinationData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HallucinationData {
    pub step: u32,
    pub page_title: String,
    #[serde(default)]
    pub invalid_concept_id: Option<String>,
    #[serde(default)]
    pub available_concepts: Vec<String>,
    #[serde(default)]
    pub retry_number: u32,
    #[serde(default)]
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelFinished {
    pub run_id: String,
    pub model_id: String,
    #[serde(default)]
    pub pair_index: Option<usize>,
    pub data: ModelReport,
}

/// `model_final` sends the metrics object directly; `model_complete` wraps it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ModelReport {
    Nested { metrics: ModelMetrics },
    Flat(ModelMetrics),
}

impl ModelReport {
    pub fn metrics(&self) -> &ModelMetrics {
        match self {
            ModelReport::Nested { metrics } | ModelReport::Flat(metrics) => metrics,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelMetrics {
    pub status: OutcomeStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub total_steps: u32,
    #[serde(default)]
    pub total_duration: f64,
    #[serde(default)]
    pub hallucination_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
    Stopped,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunFailure {
    pub run_id: String,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Stopped {
    pub run_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub pair_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunCompleted {
    pub run_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub summary: RunSummary,
}
