//! Caller-supplied job requests and the wire shapes of the start-execution endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ExecutionHandle;

/// Output language requested for a visit summary.
///
/// Only English has a transcription language code today. Any other value is
/// preserved verbatim so the transcription stage can reject it explicitly
/// rather than fall back to a default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    English,
    Unsupported(String),
}

impl Language {
    /// Transcription language code for this language, if one is defined.
    pub fn language_code(&self) -> Option<&'static str> {
        match self {
            Language::English => Some("en-US"),
            Language::Unsupported(_) => None,
        }
    }

    /// Display name as supplied by the caller.
    pub fn name(&self) -> &str {
        match self {
            Language::English => "English",
            Language::Unsupported(raw) => raw.as_str(),
        }
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        match value.as_str() {
            "English" => Language::English,
            _ => Language::Unsupported(value),
        }
    }
}

impl From<&str> for Language {
    fn from(value: &str) -> Self {
        Language::from(value.to_string())
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        match value {
            Language::English => "English".to_string(),
            Language::Unsupported(raw) => raw,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable input to one workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Caller-supplied unique job name; also names the transcript artifact.
    pub job_name: String,
    /// Locator of the recorded conversation (for example `s3://bucket/a.mp3`).
    pub audio_uri: String,
    /// Storage location (bucket) that receives the transcript artifact.
    pub output_location: String,
    /// Path segment under `output_location` for transcript artifacts.
    pub output_prefix: String,
    /// Requested output language.
    pub language: Language,
}

impl JobRequest {
    /// Object key of the transcript artifact written by the transcription capability.
    pub fn transcript_key(&self) -> String {
        format!("{}/medical/{}.json", self.output_prefix, self.job_name)
    }
}

/// JSON body accepted by the start-execution endpoint.
///
/// Every field is optional on the wire so that missing values surface as an
/// `InvalidRequest` naming the field instead of a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartExecutionRequest {
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub job_uri: Option<String>,
    #[serde(default)]
    pub output_location: Option<String>,
    #[serde(default)]
    pub output_prefix: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Optional JSON body of the stop-execution endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopExecutionRequest {
    /// Recorded as the failure cause of the aborted execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// Successful start-execution response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartExecutionResponse {
    pub sm_execution_arn: ExecutionHandle,
}

/// Error body returned by the HTTP front door.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error code, for example `InvalidRequest`.
    pub error: String,
    /// Human-readable detail.
    pub message: String,
}
