//! Engine error taxonomy and the stable codes recorded on failed executions.

use std::{fmt, time::Duration};

use thiserror::Error;
use visitnote_types::{EnvelopeError, ExecutionFailure, ExecutionHandle};

/// Cause recorded when the transcription job itself reports `FAILED`.
pub const TRANSCRIPTION_FAILED_CAUSE: &str = "Conversation analysis Failed";

/// Pipeline stage that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcription,
    Summarization,
    EntityExtraction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Transcription => "transcription",
            Stage::Summarization => "summarization",
            Stage::EntityExtraction => "entity extraction",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported language '{language}': no transcription language code is defined for it")]
    UnsupportedLanguage { language: String },

    #[error("{stage} stage failed: {message}")]
    StageInvocationFailed { stage: Stage, message: String },

    #[error("transcription job '{job_name}' failed")]
    TranscriptionJobFailed { job_name: String },

    #[error("transcription job '{job_name}' was not complete after {attempts} status checks")]
    PollLimitExceeded { job_name: String, attempts: u32 },

    #[error("execution exceeded its {}s time limit", .limit.as_secs())]
    ExecutionTimeout { limit: Duration },

    #[error("execution finished with status {status}{}", .cause.as_ref().map(|text| format!(": {text}")).unwrap_or_default())]
    ExecutionFailed { status: String, cause: Option<String> },

    #[error("orchestration engine unavailable: {0}")]
    DownstreamUnavailable(String),

    #[error("execution not found: {0}")]
    ExecutionNotFound(ExecutionHandle),

    #[error("execution was cancelled")]
    Cancelled,

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl EngineError {
    /// Wrap a capability error raised by `stage`, keeping the full context chain.
    pub fn stage(stage: Stage, error: anyhow::Error) -> Self {
        EngineError::StageInvocationFailed {
            stage,
            message: format!("{error:#}"),
        }
    }

    /// Stable error code recorded on the execution and returned over HTTP.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidRequest(_) => "InvalidRequest",
            EngineError::UnsupportedLanguage { .. } => "Transcription.UnsupportedLanguage",
            EngineError::StageInvocationFailed { .. } => "States.TaskFailed",
            EngineError::TranscriptionJobFailed { .. } => "Transcription.Failed",
            EngineError::PollLimitExceeded { .. } => "Transcription.PollLimitExceeded",
            EngineError::ExecutionTimeout { .. } => "States.Timeout",
            EngineError::ExecutionFailed { .. } => "ExecutionFailed",
            EngineError::DownstreamUnavailable(_) => "DownstreamUnavailable",
            EngineError::ExecutionNotFound(_) => "ExecutionNotFound",
            EngineError::Cancelled => "States.Aborted",
            EngineError::Envelope(_) => "States.Runtime",
        }
    }

    /// Failure record for an execution that ended with this error.
    pub fn to_failure(&self) -> ExecutionFailure {
        let cause = match self {
            EngineError::TranscriptionJobFailed { .. } => TRANSCRIPTION_FAILED_CAUSE.to_string(),
            other => other.to_string(),
        };
        ExecutionFailure {
            error: self.code().to_string(),
            cause,
        }
    }
}
