//! Experiment records and objective outcomes.

use core::hash::{Hash, Hasher};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;
use crate::value::Value;

/// Lifecycle state of an [`Experiment`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExperimentState {
    /// Created, objective not evaluated yet.
    Wip,
    /// The objective returned a result.
    Ok,
    /// The objective failed.
    Error,
}

/// What an objective evaluation produced: the value to minimize plus
/// optional side metrics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// The value to minimize.
    pub objective_result: f64,
    /// Additional named measurements.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metrics: HashMap<String, f64>,
}

impl Outcome {
    /// Creates an outcome without metrics.
    #[must_use]
    pub fn new(objective_result: f64) -> Self {
        Self {
            objective_result,
            metrics: HashMap::new(),
        }
    }

    /// Adds one metric.
    #[must_use]
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

impl From<f64> for Outcome {
    fn from(objective_result: f64) -> Self {
        Self::new(objective_result)
    }
}

/// One evaluation of the objective on one configuration.
///
/// State moves from [`Wip`](ExperimentState::Wip) to either
/// [`Ok`](ExperimentState::Ok) or [`Error`](ExperimentState::Error) exactly
/// once; the content hash is computed at that moment and never again.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Identifier, unique within a storage.
    pub id: u64,
    /// Job this experiment belongs to.
    pub job_id: u64,
    /// The evaluated configuration.
    pub params: Configuration,
    state: ExperimentState,
    create_time: DateTime<Utc>,
    finish_time: Option<DateTime<Utc>>,
    objective_result: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metrics: Option<HashMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<u64>,
}

impl Experiment {
    /// Creates a work-in-progress experiment.
    #[must_use]
    pub fn new(id: u64, job_id: u64, params: Configuration) -> Self {
        Self {
            id,
            job_id,
            params,
            state: ExperimentState::Wip,
            create_time: Utc::now(),
            finish_time: None,
            objective_result: None,
            metrics: None,
            error: None,
            hash: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ExperimentState {
        self.state
    }

    /// `true` once the experiment is `Ok` or `Error`.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, ExperimentState::Ok | ExperimentState::Error)
    }

    /// The objective value, if the evaluation succeeded.
    #[must_use]
    pub fn objective_result(&self) -> Option<f64> {
        self.objective_result
    }

    /// Side metrics recorded with the result.
    #[must_use]
    pub fn metrics(&self) -> Option<&HashMap<String, f64>> {
        self.metrics.as_ref()
    }

    /// The failure message, if the evaluation failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Creation timestamp.
    #[must_use]
    pub fn create_time(&self) -> DateTime<Utc> {
        self.create_time
    }

    /// Completion timestamp, once finished.
    #[must_use]
    pub fn finish_time(&self) -> Option<DateTime<Utc>> {
        self.finish_time
    }

    /// Looks up one parameter value.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Content hash over parameters and result; `None` until finished.
    #[must_use]
    pub fn hash(&self) -> Option<u64> {
        self.hash
    }

    /// Marks the experiment as successful. Ignored if already finished.
    pub fn apply_outcome(&mut self, outcome: Outcome) {
        if self.is_finished() {
            return;
        }
        self.objective_result = Some(outcome.objective_result);
        if !outcome.metrics.is_empty() {
            self.metrics = Some(outcome.metrics);
        }
        self.finish(ExperimentState::Ok);
    }

    /// Marks the experiment as failed. Ignored if already finished.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.is_finished() {
            return;
        }
        self.error = Some(message.into());
        self.finish(ExperimentState::Error);
    }

    fn finish(&mut self, state: ExperimentState) {
        self.state = state;
        self.finish_time = Some(Utc::now());
        self.hash = Some(self.content_hash());
    }

    fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.job_id.hash(&mut hasher);
        for (name, value) in self.params.iter() {
            name.hash(&mut hasher);
            match value {
                Value::Bool(v) => v.hash(&mut hasher),
                Value::Int(v) => v.hash(&mut hasher),
                Value::Real(v) => v.to_bits().hash(&mut hasher),
                Value::Text(v) => v.hash(&mut hasher),
            }
        }
        self.objective_result.map(f64::to_bits).hash(&mut hasher);
        hasher.finish()
    }
}
