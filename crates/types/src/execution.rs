//! Execution handles, lifecycle states, and the records callers poll.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Outputs, ResultEnvelope};

/// Opaque identifier for one workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionHandle(String);

impl ExecutionHandle {
    /// Mint a fresh handle for a job. Two calls never return the same handle.
    pub fn generate(job_name: &str) -> Self {
        let label: String = job_name
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
            .take(64)
            .collect();
        Self(format!("visitnote:execution:{label}:{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ExecutionHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ExecutionHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed,
    /// Stopped on request before reaching a terminal state.
    Aborted,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Succeeded => "SUCCEEDED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Aborted => "ABORTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States of the visit-summary state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowState {
    SubmitTranscription,
    Wait,
    CheckStatus,
    Summarize,
    ExtractEntities,
    Succeed,
    Fail,
}

impl WorkflowState {
    /// Human-facing state label used in logs and history views.
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowState::SubmitTranscription => "Submit Transcribe Job",
            WorkflowState::Wait => "Wait For Transcription",
            WorkflowState::CheckStatus => "Check Transcription Status",
            WorkflowState::Summarize => "Perform Summarization",
            WorkflowState::ExtractEntities => "Detect Entities",
            WorkflowState::Succeed => "Succeeded",
            WorkflowState::Fail => "Fail",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Succeed | WorkflowState::Fail)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry in an execution's transition history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub state: WorkflowState,
    pub entered_at: DateTime<Utc>,
}

/// Why an execution did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    /// Stable error code, for example `States.Timeout`.
    pub error: String,
    /// Human-readable cause.
    pub cause: String,
}

/// Point-in-time view of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub handle: ExecutionHandle,
    pub status: ExecutionStatus,
    /// Most recently entered state.
    pub state: WorkflowState,
    /// Latest envelope the engine has recorded.
    pub envelope: ResultEnvelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExecutionFailure>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
}

impl ExecutionSnapshot {
    pub fn outputs(&self) -> &Outputs {
        self.envelope.outputs()
    }
}

/// Ordered transitions an execution has made so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionHistory {
    pub handle: ExecutionHandle,
    pub transitions: Vec<StateTransition>,
}

impl ExecutionHistory {
    /// Number of times the execution entered `state`.
    pub fn count(&self, state: WorkflowState) -> usize {
        self.transitions.iter().filter(|transition| transition.state == state).count()
    }
}
