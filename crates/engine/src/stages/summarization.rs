use std::sync::Arc;

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tracing::info;
use visitnote_api::{ArtifactStore, SummarizationCapability};
use visitnote_types::{EnvelopeError, Language, ResultEnvelope, TranscriptionJobStatus};
use visitnote_util::{describe_text, escape_summary_markup};

use crate::{EngineError, Stage};

/// Reads the finished transcript and asks the model for a visit summary.
#[derive(Clone)]
pub struct SummarizationStage {
    artifacts: Arc<dyn ArtifactStore>,
    capability: Arc<dyn SummarizationCapability>,
    max_tokens: u32,
}

impl SummarizationStage {
    pub fn new(artifacts: Arc<dyn ArtifactStore>, capability: Arc<dyn SummarizationCapability>, max_tokens: u32) -> Self {
        Self {
            artifacts,
            capability,
            max_tokens,
        }
    }

    /// Write the summarization block; the transcription must be `COMPLETED`.
    pub async fn run(&self, envelope: &mut ResultEnvelope) -> Result<(), EngineError> {
        match envelope.transcription() {
            Some(block) if block.status == TranscriptionJobStatus::Completed => {}
            Some(block) => {
                return Err(EnvelopeError::TranscriptionIncomplete {
                    block: "SummarizationOutput",
                    status: block.status.to_string(),
                }
                .into());
            }
            None => {
                return Err(EnvelopeError::MissingPredecessor {
                    block: "SummarizationOutput",
                    requires: "TranscriptionOutput",
                }
                .into());
            }
        }

        let request = envelope.input();
        let key = request.transcript_key();
        let bytes = self
            .artifacts
            .get_object(&request.output_location, &key)
            .await
            .with_context(|| format!("read transcript artifact '{key}'"))
            .map_err(|error| EngineError::stage(Stage::Summarization, error))?;
        let transcript = extract_transcript(&bytes).map_err(|error| EngineError::stage(Stage::Summarization, error))?;
        if transcript.trim().is_empty() {
            return Err(EngineError::stage(Stage::Summarization, anyhow!("transcript artifact '{key}' is empty")));
        }

        let prompt = build_summary_prompt(&transcript, &request.language);
        info!(job_name = %request.job_name, transcript = %describe_text(&transcript), "requesting visit summary");
        let completion = self
            .capability
            .summarize(&prompt, self.max_tokens)
            .await
            .map_err(|error| EngineError::stage(Stage::Summarization, error))?;
        if completion.trim().is_empty() {
            return Err(EngineError::stage(Stage::Summarization, anyhow!("model returned an empty summary")));
        }

        envelope.record_summary(escape_summary_markup(&completion))?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptArtifact {
    results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
struct TranscriptResults {
    #[serde(default)]
    transcripts: Vec<TranscriptEntry>,
}

#[derive(Debug, Deserialize)]
struct TranscriptEntry {
    transcript: String,
}

/// Pull the first transcript text (`results.transcripts[0].transcript`) out of an artifact.
pub fn extract_transcript(bytes: &[u8]) -> anyhow::Result<String> {
    let artifact: TranscriptArtifact = serde_json::from_slice(bytes).context("decode transcript artifact")?;
    artifact
        .results
        .transcripts
        .into_iter()
        .next()
        .map(|entry| entry.transcript)
        .ok_or_else(|| anyhow!("transcript artifact has no transcripts"))
}

/// Transcript followed by the lower-cased summarization instruction.
pub fn build_summary_prompt(transcript: &str, language: &Language) -> String {
    let command = format!(
        "Summarize this conversation in {}. Highlight the key observations and action items in as much details possible",
        language.name()
    );
    format!("{}. {}", transcript, command.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSummarizer, MemoryArtifacts, job_request, transcript_artifact};
    use visitnote_types::TranscriptionOutput;

    const KEY: &str = "audio_transcripts/medical/visit-1.json";

    fn completed_envelope() -> ResultEnvelope {
        let mut envelope = ResultEnvelope::new(job_request("visit-1"));
        envelope
            .record_transcription(TranscriptionOutput {
                job_name: "visit-1".into(),
                status: TranscriptionJobStatus::Completed,
                language_code: "en-US".into(),
                media_uri: "s3://b/a.mp3".into(),
            })
            .expect("transcription");
        envelope
    }

    #[test]
    fn prompt_appends_lowercased_instruction() {
        let prompt = build_summary_prompt("Patient: my knee hurts", &Language::English);
        assert_eq!(
            prompt,
            "Patient: my knee hurts. summarize this conversation in english. highlight the key observations and action items in as much details possible"
        );
    }

    #[test]
    fn transcript_is_read_from_first_entry() {
        assert_eq!(extract_transcript(&transcript_artifact("hello")).expect("extract"), "hello");
        assert!(extract_transcript(br#"{"results":{"transcripts":[]}}"#).is_err());
        assert!(extract_transcript(b"not json").is_err());
    }

    #[tokio::test]
    async fn summary_is_escaped_and_recorded() {
        let artifacts = Arc::new(MemoryArtifacts::default().with_object("b", KEY, transcript_artifact("co-pay talk")));
        let summarizer = Arc::new(FakeSummarizer::replying("Co-pay is $20."));
        let stage = SummarizationStage::new(artifacts, summarizer.clone(), 1024);
        let mut envelope = completed_envelope();

        stage.run(&mut envelope).await.expect("summarize");

        assert_eq!(envelope.summary(), Some("Co-pay is \\$20."));
        let (prompt, max_tokens) = summarizer.prompts.lock().expect("lock")[0].clone();
        assert!(prompt.starts_with("co-pay talk. summarize this conversation in english."));
        assert_eq!(max_tokens, 1024);
    }

    #[tokio::test]
    async fn empty_transcript_fails_without_calling_the_model() {
        let artifacts = Arc::new(MemoryArtifacts::default().with_object("b", KEY, transcript_artifact("   ")));
        let summarizer = Arc::new(FakeSummarizer::replying("unused"));
        let stage = SummarizationStage::new(artifacts, summarizer.clone(), 1024);
        let mut envelope = completed_envelope();

        let error = stage.run(&mut envelope).await.unwrap_err();

        assert!(matches!(
            error,
            EngineError::StageInvocationFailed {
                stage: Stage::Summarization,
                ..
            }
        ));
        assert_eq!(summarizer.call_count(), 0);
        assert!(envelope.summary().is_none());
    }

    #[tokio::test]
    async fn missing_artifact_and_model_errors_fail_the_stage() {
        let summarizer = Arc::new(FakeSummarizer::failing("model overloaded"));
        let stage = SummarizationStage::new(Arc::new(MemoryArtifacts::default()), summarizer.clone(), 1024);
        let error = stage.run(&mut completed_envelope()).await.unwrap_err();
        assert!(error.to_string().contains("read transcript artifact"));

        let artifacts = Arc::new(MemoryArtifacts::default().with_object("b", KEY, transcript_artifact("hello")));
        let stage = SummarizationStage::new(artifacts, summarizer, 1024);
        let error = stage.run(&mut completed_envelope()).await.unwrap_err();
        assert!(error.to_string().contains("model overloaded"));
    }

    #[tokio::test]
    async fn refuses_to_run_before_transcription_completes() {
        let stage = SummarizationStage::new(
            Arc::new(MemoryArtifacts::default()),
            Arc::new(FakeSummarizer::replying("unused")),
            1024,
        );
        let mut envelope = ResultEnvelope::new(job_request("visit-1"));
        envelope
            .record_transcription(TranscriptionOutput {
                job_name: "visit-1".into(),
                status: TranscriptionJobStatus::InProgress,
                language_code: "en-US".into(),
                media_uri: "s3://b/a.mp3".into(),
            })
            .expect("transcription");

        let error = stage.run(&mut envelope).await.unwrap_err();
        assert!(matches!(error, EngineError::Envelope(EnvelopeError::TranscriptionIncomplete { .. })));
    }
}
