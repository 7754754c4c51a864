//! Outcome of one flow execution.
//!
//! A `FlowResult` only grows: steps and failures are appended in execution order
//! and the terminal error is set at most once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::flow_step::{FlowStep, StepAction};
use crate::domain::snapshot::{FieldChange, StateSnapshot};
use crate::domain::validation::ValidationResult;
use crate::error::{BoundaryErrorKind, CoreError};

/// Final state of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Ok,
    Skipped,
    Fail,
    HttpError,
}

/// Lifecycle of a flow execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Running,
    Completed,
    Aborted,
}

/// Operator-facing verdict of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlowStatus {
    Pass,
    Fail,
    Error,
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowStatus::Pass => "PASS",
            FlowStatus::Fail => "FAIL",
            FlowStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub action: StepAction,
    pub description: String,
    pub outcome: StepOutcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// A validator that did not hold after a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub step_index: usize,
    pub action: StepAction,
    pub description: String,
    pub validation: ValidationResult,
    pub before: Option<StateSnapshot>,
    pub after: StateSnapshot,
    /// Derived fields that changed between `before` and `after`
    #[serde(default)]
    pub changes: BTreeMap<String, FieldChange>,
}

/// Why a flow aborted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowErrorRecord {
    pub step_index: usize,
    pub action: StepAction,
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub errors: serde_json::Value,
}

impl FlowErrorRecord {
    pub fn from_error(step_index: usize, step: &FlowStep, error: &CoreError) -> Self {
        match error {
            CoreError::Boundary(boundary) => Self {
                step_index,
                action: step.action,
                kind: match boundary.kind {
                    BoundaryErrorKind::Rejected => "rejected".to_string(),
                    BoundaryErrorKind::ContractViolation => "contract_violation".to_string(),
                },
                message: boundary.message.clone(),
                status: match boundary.kind {
                    BoundaryErrorKind::Rejected => Some(boundary.status),
                    BoundaryErrorKind::ContractViolation => None,
                },
                errors: boundary.errors.clone(),
            },
            other => Self {
                step_index,
                action: step.action,
                kind: other.kind().to_string(),
                message: other.to_string(),
                status: None,
                errors: serde_json::Value::Null,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    iteration: u32,
    seed: u64,
    subject_id: Option<u64>,
    public_id: Option<String>,
    state: FlowState,
    steps: Vec<StepRecord>,
    failures: Vec<FailureRecord>,
    error: Option<FlowErrorRecord>,
    randomizer_calls: u64,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl FlowResult {
    pub fn new(iteration: u32, seed: u64) -> Self {
        Self {
            iteration,
            seed,
            subject_id: None,
            public_id: None,
            state: FlowState::Running,
            steps: Vec::new(),
            failures: Vec::new(),
            error: None,
            randomizer_calls: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn set_subject(&mut self, subject_id: u64, public_id: String) {
        self.subject_id = Some(subject_id);
        self.public_id = Some(public_id);
    }

    pub fn add_step(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    pub fn add_failure(&mut self, failure: FailureRecord) {
        self.failures.push(failure);
    }

    /// Record the terminal error and stop the flow. Later calls are ignored.
    pub fn abort(&mut self, error: FlowErrorRecord) {
        if self.error.is_none() {
            self.error = Some(error);
            self.state = FlowState::Aborted;
        }
    }

    /// Close the result; an aborted flow stays aborted.
    pub fn finish(&mut self, randomizer_calls: u64) {
        self.randomizer_calls = randomizer_calls;
        self.finished_at = Some(Utc::now());
        if self.state == FlowState::Running {
            self.state = FlowState::Completed;
        }
    }

    pub fn status(&self) -> FlowStatus {
        if self.error.is_some() {
            FlowStatus::Error
        } else if !self.failures.is_empty() {
            FlowStatus::Fail
        } else {
            FlowStatus::Pass
        }
    }

    pub fn passed(&self) -> bool {
        self.status() == FlowStatus::Pass
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn subject_id(&self) -> Option<u64> {
        self.subject_id
    }

    pub fn public_id(&self) -> Option<&str> {
        self.public_id.as_deref()
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    pub fn error(&self) -> Option<&FlowErrorRecord> {
        self.error.as_ref()
    }

    pub fn randomizer_calls(&self) -> u64 {
        self.randomizer_calls
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// Pattern of every failure, `unknown` when a validator gave none
    pub fn failure_patterns(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|f| {
                f.validation
                    .pattern
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string())
            })
            .collect()
    }

    pub fn outcome_of(&self, action: StepAction) -> Vec<StepOutcome> {
        self.steps
            .iter()
            .filter(|s| s.action == action)
            .map(|s| s.outcome)
            .collect()
    }

    pub fn warning_count(&self) -> usize {
        self.steps.iter().map(|s| s.warnings.len()).sum()
    }
}
