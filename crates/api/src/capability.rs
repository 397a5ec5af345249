//! Contracts of the external capabilities the pipeline drives.
//!
//! The engine only ever talks to these traits. Implementations normalize the
//! remote service's response into the shapes below before returning, so the
//! state machine never inspects raw payloads.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use visitnote_types::{MedicalEntity, TranscriptionJobStatus};

/// Medical specialty sent with every transcription job.
pub const TRANSCRIPTION_SPECIALTY: &str = "PRIMARYCARE";
/// Audio type sent with every transcription job.
pub const TRANSCRIPTION_TYPE: &str = "CONVERSATION";

/// Parameters of a new transcription job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionSubmission {
    pub job_name: String,
    pub language_code: String,
    pub media_uri: String,
    pub output_bucket: String,
    pub output_key: String,
    pub specialty: String,
    pub kind: String,
}

/// Normalized view of a transcription job as reported by the capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionJob {
    pub job_name: String,
    pub status: TranscriptionJobStatus,
    /// Absent when the capability omits it from a status response.
    pub language_code: Option<String>,
    pub media_uri: Option<String>,
}

/// Asynchronous speech-to-text jobs.
#[async_trait]
pub trait TranscriptionCapability: Send + Sync {
    /// Start a job; returns the capability's immediate view of it.
    async fn submit(&self, submission: &TranscriptionSubmission) -> Result<TranscriptionJob>;

    /// Fetch the current state of a job by name.
    async fn get_status(&self, job_name: &str) -> Result<TranscriptionJob>;
}

/// Free-text generation used to summarize a transcript.
#[async_trait]
pub trait SummarizationCapability: Send + Sync {
    async fn summarize(&self, prompt_text: &str, max_tokens: u32) -> Result<String>;
}

/// Medical entity detection over free text.
#[async_trait]
pub trait EntityExtractionCapability: Send + Sync {
    /// Entities in the order the service reports them.
    async fn detect_entities(&self, text: &str) -> Result<Vec<MedicalEntity>>;
}

/// Read access to the storage that holds transcript artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn get_object(&self, location: &str, key: &str) -> Result<Vec<u8>>;
}
