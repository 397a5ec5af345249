//! The result envelope threaded through a workflow execution.
//!
//! An envelope starts with the caller's [`JobRequest`] and accumulates one
//! named output block per stage. Blocks are written once, in pipeline order:
//! transcription, then summarization, then entity extraction. The only
//! in-place update allowed is refreshing the transcription job status while
//! polling, and only until the summary has been written.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::JobRequest;

/// Status reported by the transcription capability for a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TranscriptionJobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    /// Any status string the capability returns that is not listed above.
    Unrecognized(String),
}

impl TranscriptionJobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TranscriptionJobStatus::Queued => "QUEUED",
            TranscriptionJobStatus::InProgress => "IN_PROGRESS",
            TranscriptionJobStatus::Completed => "COMPLETED",
            TranscriptionJobStatus::Failed => "FAILED",
            TranscriptionJobStatus::Unrecognized(raw) => raw.as_str(),
        }
    }

    /// `true` for `COMPLETED` and `FAILED`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TranscriptionJobStatus::Completed | TranscriptionJobStatus::Failed)
    }
}

impl From<String> for TranscriptionJobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "QUEUED" => TranscriptionJobStatus::Queued,
            "IN_PROGRESS" => TranscriptionJobStatus::InProgress,
            "COMPLETED" => TranscriptionJobStatus::Completed,
            "FAILED" => TranscriptionJobStatus::Failed,
            _ => TranscriptionJobStatus::Unrecognized(value),
        }
    }
}

impl From<&str> for TranscriptionJobStatus {
    fn from(value: &str) -> Self {
        TranscriptionJobStatus::from(value.to_string())
    }
}

impl From<TranscriptionJobStatus> for String {
    fn from(value: TranscriptionJobStatus) -> Self {
        match value {
            TranscriptionJobStatus::Unrecognized(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TranscriptionJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output block written by the transcription stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionOutput {
    pub job_name: String,
    pub status: TranscriptionJobStatus,
    pub language_code: String,
    pub media_uri: String,
}

/// Output block written by the summarization stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizationOutput {
    pub summary: String,
}

/// One medical entity detected in the visit summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalEntity {
    pub text: String,
    /// Entity category, for example `MEDICAL_CONDITION` or `MEDICATION`.
    pub category: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_offset: Option<u64>,
}

/// Output block written by the entity extraction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityExtractionOutput {
    /// Entities in the order the capability returned them.
    pub entities: Vec<MedicalEntity>,
}

/// The named stage output blocks accumulated so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(rename = "TranscriptionOutput", default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<TranscriptionOutput>,
    #[serde(rename = "SummarizationOutput", default, skip_serializing_if = "Option::is_none")]
    pub summarization: Option<SummarizationOutput>,
    #[serde(rename = "EntityExtractionOutput", default, skip_serializing_if = "Option::is_none")]
    pub entity_extraction: Option<EntityExtractionOutput>,
}

/// Violations of the envelope's write-once, in-order discipline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("{block} has already been written")]
    AlreadyWritten { block: &'static str },

    #[error("{block} requires {requires} to be written first")]
    MissingPredecessor { block: &'static str, requires: &'static str },

    #[error("{block} requires a COMPLETED transcription, found {status}")]
    TranscriptionIncomplete { block: &'static str, status: String },
}

const TRANSCRIPTION_BLOCK: &str = "TranscriptionOutput";
const SUMMARIZATION_BLOCK: &str = "SummarizationOutput";
const ENTITY_BLOCK: &str = "EntityExtractionOutput";

/// Accumulating, append-only result of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    #[serde(rename = "ExecutionInput")]
    input: JobRequest,
    #[serde(rename = "Outputs", default)]
    outputs: Outputs,
}

impl ResultEnvelope {
    /// Seed an envelope holding only the caller's request.
    pub fn new(input: JobRequest) -> Self {
        Self {
            input,
            outputs: Outputs::default(),
        }
    }

    pub fn input(&self) -> &JobRequest {
        &self.input
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn into_outputs(self) -> Outputs {
        self.outputs
    }

    pub fn transcription(&self) -> Option<&TranscriptionOutput> {
        self.outputs.transcription.as_ref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.outputs.summarization.as_ref().map(|block| block.summary.as_str())
    }

    pub fn entities(&self) -> Option<&[MedicalEntity]> {
        self.outputs.entity_extraction.as_ref().map(|block| block.entities.as_slice())
    }

    /// Write the transcription block produced by a job submission.
    pub fn record_transcription(&mut self, output: TranscriptionOutput) -> Result<(), EnvelopeError> {
        if self.outputs.transcription.is_some() {
            return Err(EnvelopeError::AlreadyWritten {
                block: TRANSCRIPTION_BLOCK,
            });
        }
        self.outputs.transcription = Some(output);
        Ok(())
    }

    /// Refresh only the job status of the transcription block.
    ///
    /// Rejected once a summary exists, since later stages have consumed the block.
    pub fn update_transcription_status(&mut self, status: TranscriptionJobStatus) -> Result<&TranscriptionOutput, EnvelopeError> {
        if self.outputs.summarization.is_some() {
            return Err(EnvelopeError::AlreadyWritten {
                block: SUMMARIZATION_BLOCK,
            });
        }
        let transcription = self.outputs.transcription.as_mut().ok_or(EnvelopeError::MissingPredecessor {
            block: TRANSCRIPTION_BLOCK,
            requires: "a submitted transcription job",
        })?;
        transcription.status = status;
        Ok(transcription)
    }

    /// Write the summary; requires a `COMPLETED` transcription.
    pub fn record_summary(&mut self, summary: String) -> Result<(), EnvelopeError> {
        let transcription = self.outputs.transcription.as_ref().ok_or(EnvelopeError::MissingPredecessor {
            block: SUMMARIZATION_BLOCK,
            requires: TRANSCRIPTION_BLOCK,
        })?;
        if transcription.status != TranscriptionJobStatus::Completed {
            return Err(EnvelopeError::TranscriptionIncomplete {
                block: SUMMARIZATION_BLOCK,
                status: transcription.status.to_string(),
            });
        }
        if self.outputs.summarization.is_some() {
            return Err(EnvelopeError::AlreadyWritten {
                block: SUMMARIZATION_BLOCK,
            });
        }
        self.outputs.summarization = Some(SummarizationOutput { summary });
        Ok(())
    }

    /// Write the detected entities; requires a summary.
    pub fn record_entities(&mut self, entities: Vec<MedicalEntity>) -> Result<(), EnvelopeError> {
        if self.outputs.summarization.is_none() {
            return Err(EnvelopeError::MissingPredecessor {
                block: ENTITY_BLOCK,
                requires: SUMMARIZATION_BLOCK,
            });
        }
        if self.outputs.entity_extraction.is_some() {
            return Err(EnvelopeError::AlreadyWritten { block: ENTITY_BLOCK });
        }
        self.outputs.entity_extraction = Some(EntityExtractionOutput { entities });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Language;

    fn seed() -> ResultEnvelope {
        ResultEnvelope::new(JobRequest {
            job_name: "visit-1".into(),
            audio_uri: "s3://b/a.mp3".into(),
            output_location: "b".into(),
            output_prefix: "audio_transcripts".into(),
            language: Language::English,
        })
    }

    fn transcription(status: TranscriptionJobStatus) -> TranscriptionOutput {
        TranscriptionOutput {
            job_name: "visit-1".into(),
            status,
            language_code: "en-US".into(),
            media_uri: "s3://b/a.mp3".into(),
        }
    }

    #[test]
    fn unknown_status_strings_survive_round_trip() {
        let status: TranscriptionJobStatus = serde_json::from_str("\"PAUSED\"").expect("parse");
        assert_eq!(status, TranscriptionJobStatus::Unrecognized("PAUSED".into()));
        assert_eq!(serde_json::to_string(&status).expect("serialize"), "\"PAUSED\"");
        assert!(!status.is_terminal());
    }

    #[test]
    fn transcription_block_is_written_once() {
        let mut envelope = seed();
        envelope
            .record_transcription(transcription(TranscriptionJobStatus::InProgress))
            .expect("first write");
        let error = envelope
            .record_transcription(transcription(TranscriptionJobStatus::Completed))
            .unwrap_err();
        assert_eq!(error, EnvelopeError::AlreadyWritten { block: "TranscriptionOutput" });
    }

    #[test]
    fn status_update_leaves_other_fields_untouched() {
        let mut envelope = seed();
        envelope
            .record_transcription(transcription(TranscriptionJobStatus::InProgress))
            .expect("submit");
        let updated = envelope
            .update_transcription_status(TranscriptionJobStatus::Completed)
            .expect("poll")
            .clone();
        assert_eq!(updated, transcription(TranscriptionJobStatus::Completed));
    }

    #[test]
    fn summary_requires_completed_transcription() {
        let mut envelope = seed();
        assert!(matches!(
            envelope.record_summary("text".into()),
            Err(EnvelopeError::MissingPredecessor { .. })
        ));
        envelope
            .record_transcription(transcription(TranscriptionJobStatus::InProgress))
            .expect("submit");
        assert!(matches!(
            envelope.record_summary("text".into()),
            Err(EnvelopeError::TranscriptionIncomplete { .. })
        ));
    }

    #[test]
    fn summary_seals_transcription_block() {
        let mut envelope = seed();
        envelope
            .record_transcription(transcription(TranscriptionJobStatus::Completed))
            .expect("submit");
        envelope.record_summary("Patient has diabetes.".into()).expect("summary");
        assert!(envelope.update_transcription_status(TranscriptionJobStatus::Failed).is_err());
        assert!(envelope.record_summary("again".into()).is_err());
    }

    #[test]
    fn entities_require_summary_and_keep_order() {
        let mut envelope = seed();
        let entities = vec![
            MedicalEntity {
                text: "metformin".into(),
                category: "MEDICATION".into(),
                entity_type: "GENERIC_NAME".into(),
                score: None,
                begin_offset: None,
                end_offset: None,
            },
            MedicalEntity {
                text: "diabetes".into(),
                category: "MEDICAL_CONDITION".into(),
                entity_type: "DX_NAME".into(),
                score: Some(0.98),
                begin_offset: None,
                end_offset: None,
            },
        ];
        assert!(envelope.record_entities(entities.clone()).is_err());

        envelope
            .record_transcription(transcription(TranscriptionJobStatus::Completed))
            .expect("submit");
        envelope.record_summary("summary".into()).expect("summary");
        envelope.record_entities(entities.clone()).expect("entities");
        assert_eq!(envelope.entities(), Some(entities.as_slice()));
    }

    #[test]
    fn serialized_outputs_omit_unwritten_blocks() {
        let mut envelope = seed();
        envelope
            .record_transcription(transcription(TranscriptionJobStatus::Failed))
            .expect("submit");
        let value = serde_json::to_value(&envelope).expect("serialize");
        let outputs = value["Outputs"].as_object().expect("outputs object");
        assert!(outputs.contains_key("TranscriptionOutput"));
        assert!(!outputs.contains_key("SummarizationOutput"));
        assert_eq!(value["ExecutionInput"]["language"], "English");
    }
}
