//! Per-run outcome records and the workflow state machine.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// An error relating to outcome state transitions.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum OutcomeError {
    /// Transition violates the monotonic state machine.
    #[error("Invalid state transition: {from:?} -> {to:?}.")]
    InvalidTransition {
        from: WorkflowState,
        to: WorkflowState,
    },
}

/// Lifecycle state of one workflow run. Transitions are monotonic:
/// `NotStarted -> Running -> {Success | FailedWithErrors}`, with a direct
/// failure edge from `NotStarted` for flows rejected before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowState {
    NotStarted,
    Running,
    Success,
    FailedWithErrors,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Success | WorkflowState::FailedWithErrors)
    }
}

/// Per-action record, appended in execution order and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub action_id: Uuid,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ActionOutcome {
    pub fn succeeded(action_id: Uuid, output: Value) -> Self {
        Self {
            action_id,
            success: true,
            output_json: Some(output),
            error_message: None,
        }
    }

    pub fn failed(action_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            action_id,
            success: false,
            output_json: None,
            error_message: Some(error.into()),
        }
    }
}

/// The record of one concrete execution of a process flow. Owned exclusively
/// by the dispatcher for the duration of the run; terminal once `ended_utc`
/// is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOutcome {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub state: WorkflowState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_utc: Option<DateTime<Utc>>,
    /// The triggering payload, kept verbatim for audit and replay.
    pub execution_context: Value,
    pub action_outcomes: Vec<ActionOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_json: Option<String>,
}

impl WorkflowOutcome {
    pub fn new(workflow_id: Uuid, execution_context: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            state: WorkflowState::NotStarted,
            started_utc: None,
            ended_utc: None,
            execution_context,
            action_outcomes: Vec::new(),
            error_json: None,
        }
    }

    /// Marks the run as started, recording the start time.
    pub fn start(&mut self) -> Result<(), OutcomeError> {
        self.transition(WorkflowState::Running)?;
        self.started_utc = Some(Utc::now());
        Ok(())
    }

    /// Marks the run as successfully completed.
    pub fn succeed(&mut self) -> Result<(), OutcomeError> {
        self.transition(WorkflowState::Success)?;
        self.ended_utc = Some(Utc::now());
        Ok(())
    }

    /// Marks the run as terminally failed, recording the error description.
    pub fn fail(&mut self, error_json: impl Into<String>) -> Result<(), OutcomeError> {
        self.transition(WorkflowState::FailedWithErrors)?;
        self.ended_utc = Some(Utc::now());
        self.error_json = Some(error_json.into());
        Ok(())
    }

    /// Appends a per-action record.
    pub fn record(&mut self, outcome: ActionOutcome) {
        self.action_outcomes.push(outcome);
    }

    fn transition(&mut self, to: WorkflowState) -> Result<(), OutcomeError> {
        let allowed = matches!(
            (self.state, to),
            (WorkflowState::NotStarted, WorkflowState::Running)
                | (WorkflowState::NotStarted, WorkflowState::FailedWithErrors)
                | (WorkflowState::Running, WorkflowState::Success)
                | (WorkflowState::Running, WorkflowState::FailedWithErrors)
        );
        if !allowed {
            return Err(OutcomeError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}
