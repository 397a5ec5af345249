//! Scripted capability fakes shared by the engine's unit tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::json;
use visitnote_api::{
    ArtifactStore, EntityExtractionCapability, SummarizationCapability, TranscriptionCapability, TranscriptionJob,
    TranscriptionSubmission,
};
use visitnote_types::{JobRequest, Language, MedicalEntity, TranscriptionJobStatus};

use crate::stages::StageServices;

pub(crate) fn job_request(job_name: &str) -> JobRequest {
    JobRequest {
        job_name: job_name.to_string(),
        audio_uri: "s3://b/a.mp3".into(),
        output_location: "b".into(),
        output_prefix: "audio_transcripts".into(),
        language: Language::English,
    }
}

pub(crate) fn transcript_artifact(text: &str) -> Vec<u8> {
    json!({
        "jobName": "visit-1",
        "results": { "transcripts": [{ "transcript": text }] }
    })
    .to_string()
    .into_bytes()
}

pub(crate) fn condition(text: &str) -> MedicalEntity {
    MedicalEntity {
        text: text.to_string(),
        category: "MEDICAL_CONDITION".into(),
        entity_type: "DX_NAME".into(),
        score: Some(0.97),
        begin_offset: Some(0),
        end_offset: Some(text.len() as u64),
    }
}

/// Reports statuses from a script: the first for the submission, the rest
/// for successive status checks. The last status repeats once the script runs out.
#[derive(Default)]
pub(crate) struct ScriptedTranscription {
    script: Mutex<VecDeque<TranscriptionJobStatus>>,
    last: Mutex<Option<TranscriptionJobStatus>>,
    pub submissions: Mutex<Vec<TranscriptionSubmission>>,
    pub status_checks: Mutex<Vec<String>>,
    pub fail_submit: bool,
}

impl ScriptedTranscription {
    pub fn new(statuses: &[&str]) -> Self {
        Self {
            script: Mutex::new(statuses.iter().map(|status| TranscriptionJobStatus::from(*status)).collect()),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_submit: true,
            ..Default::default()
        }
    }

    fn next_status(&self) -> TranscriptionJobStatus {
        let mut last = self.last.lock().expect("lock");
        let status = self
            .script
            .lock()
            .expect("lock")
            .pop_front()
            .or_else(|| last.clone())
            .unwrap_or(TranscriptionJobStatus::InProgress);
        *last = Some(status.clone());
        status
    }

    pub fn submit_count(&self) -> usize {
        self.submissions.lock().expect("lock").len()
    }

    pub fn status_check_count(&self) -> usize {
        self.status_checks.lock().expect("lock").len()
    }
}

#[async_trait]
impl TranscriptionCapability for ScriptedTranscription {
    async fn submit(&self, submission: &TranscriptionSubmission) -> Result<TranscriptionJob> {
        if self.fail_submit {
            bail!("transcription returned HTTP 503");
        }
        self.submissions.lock().expect("lock").push(submission.clone());
        Ok(TranscriptionJob {
            job_name: submission.job_name.clone(),
            status: self.next_status(),
            language_code: Some(submission.language_code.clone()),
            media_uri: Some(submission.media_uri.clone()),
        })
    }

    async fn get_status(&self, job_name: &str) -> Result<TranscriptionJob> {
        self.status_checks.lock().expect("lock").push(job_name.to_string());
        Ok(TranscriptionJob {
            job_name: job_name.to_string(),
            status: self.next_status(),
            language_code: None,
            media_uri: None,
        })
    }
}

pub(crate) struct FakeSummarizer {
    reply: Result<String, String>,
    pub prompts: Mutex<Vec<(String, u32)>>,
}

impl FakeSummarizer {
    pub fn replying(summary: &str) -> Self {
        Self {
            reply: Ok(summary.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().expect("lock").len()
    }
}

#[async_trait]
impl SummarizationCapability for FakeSummarizer {
    async fn summarize(&self, prompt_text: &str, max_tokens: u32) -> Result<String> {
        self.prompts.lock().expect("lock").push((prompt_text.to_string(), max_tokens));
        self.reply.clone().map_err(|message| anyhow!(message))
    }
}

pub(crate) struct FakeEntities {
    entities: Vec<MedicalEntity>,
    pub texts: Mutex<Vec<String>>,
}

impl FakeEntities {
    pub fn returning(entities: Vec<MedicalEntity>) -> Self {
        Self {
            entities,
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.texts.lock().expect("lock").len()
    }
}

#[async_trait]
impl EntityExtractionCapability for FakeEntities {
    async fn detect_entities(&self, text: &str) -> Result<Vec<MedicalEntity>> {
        self.texts.lock().expect("lock").push(text.to_string());
        Ok(self.entities.clone())
    }
}

#[derive(Default)]
pub(crate) struct MemoryArtifacts {
    objects: HashMap<(String, String), Vec<u8>>,
}

impl MemoryArtifacts {
    pub fn with_object(mut self, location: &str, key: &str, bytes: Vec<u8>) -> Self {
        self.objects.insert((location.to_string(), key.to_string()), bytes);
        self
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifacts {
    async fn get_object(&self, location: &str, key: &str) -> Result<Vec<u8>> {
        self.objects
            .get(&(location.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("object '{location}/{key}' not found"))
    }
}

/// Fakes wired together, with handles kept for assertions.
pub(crate) struct Fakes {
    pub transcription: Arc<ScriptedTranscription>,
    pub summarizer: Arc<FakeSummarizer>,
    pub entities: Arc<FakeEntities>,
    pub artifacts: Arc<MemoryArtifacts>,
}

impl Fakes {
    /// A happy-path pipeline for `visit-1` whose transcription follows `statuses`.
    pub fn visit(statuses: &[&str]) -> Self {
        Self {
            transcription: Arc::new(ScriptedTranscription::new(statuses)),
            summarizer: Arc::new(FakeSummarizer::replying("Patient reports diabetes; follow up in 3 months.")),
            entities: Arc::new(FakeEntities::returning(vec![condition("diabetes")])),
            artifacts: Arc::new(MemoryArtifacts::default().with_object(
                "b",
                "audio_transcripts/medical/visit-1.json",
                transcript_artifact("Doctor: how are you. Patient: I have diabetes"),
            )),
        }
    }

    pub fn services(&self) -> StageServices {
        StageServices {
            transcription: self.transcription.clone(),
            summarization: self.summarizer.clone(),
            entities: self.entities.clone(),
            artifacts: self.artifacts.clone(),
        }
    }
}
