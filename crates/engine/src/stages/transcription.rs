use std::sync::Arc;

use tracing::{debug, info};
use visitnote_api::{TRANSCRIPTION_SPECIALTY, TRANSCRIPTION_TYPE, TranscriptionCapability, TranscriptionSubmission};
use visitnote_types::{EnvelopeError, ResultEnvelope, TranscriptionJobStatus, TranscriptionOutput};

use crate::{EngineError, Stage};

/// Which half of the transcription stage to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptionMode {
    /// Start the job and write the transcription block.
    Submit,
    /// Refresh the status of an already-submitted job.
    Poll,
}

/// Starts transcription jobs and checks on them.
#[derive(Clone)]
pub struct TranscriptionStage {
    capability: Arc<dyn TranscriptionCapability>,
}

impl TranscriptionStage {
    pub fn new(capability: Arc<dyn TranscriptionCapability>) -> Self {
        Self { capability }
    }

    /// Run the stage in `mode`, returning the job status now recorded in the envelope.
    pub async fn run(&self, mode: TranscriptionMode, envelope: &mut ResultEnvelope) -> Result<TranscriptionJobStatus, EngineError> {
        match mode {
            TranscriptionMode::Submit => self.submit(envelope).await,
            TranscriptionMode::Poll => self.poll(envelope).await,
        }
    }

    async fn submit(&self, envelope: &mut ResultEnvelope) -> Result<TranscriptionJobStatus, EngineError> {
        let request = envelope.input();
        let language_code = request
            .language
            .language_code()
            .ok_or_else(|| EngineError::UnsupportedLanguage {
                language: request.language.name().to_string(),
            })?;

        let submission = TranscriptionSubmission {
            job_name: request.job_name.clone(),
            language_code: language_code.to_string(),
            media_uri: request.audio_uri.clone(),
            output_bucket: request.output_location.clone(),
            output_key: request.transcript_key(),
            specialty: TRANSCRIPTION_SPECIALTY.to_string(),
            kind: TRANSCRIPTION_TYPE.to_string(),
        };
        let job = self
            .capability
            .submit(&submission)
            .await
            .map_err(|error| EngineError::stage(Stage::Transcription, error))?;
        info!(job_name = %submission.job_name, status = %job.status, "transcription job submitted");

        let output = TranscriptionOutput {
            job_name: if job.job_name.is_empty() { submission.job_name } else { job.job_name },
            status: job.status.clone(),
            language_code: job.language_code.unwrap_or(submission.language_code),
            media_uri: job.media_uri.unwrap_or(submission.media_uri),
        };
        envelope.record_transcription(output)?;
        Ok(job.status)
    }

    async fn poll(&self, envelope: &mut ResultEnvelope) -> Result<TranscriptionJobStatus, EngineError> {
        let job_name = envelope
            .transcription()
            .map(|transcription| transcription.job_name.clone())
            .ok_or(EnvelopeError::MissingPredecessor {
                block: "TranscriptionOutput",
                requires: "a submitted transcription job",
            })?;

        let job = self
            .capability
            .get_status(&job_name)
            .await
            .map_err(|error| EngineError::stage(Stage::Transcription, error))?;
        debug!(job_name = %job_name, status = %job.status, "transcription status checked");

        let updated = envelope.update_transcription_status(job.status)?;
        Ok(updated.status.clone())
    }
}
