use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use visitnote_api::{
    EntityExtractionCapability, FsArtifactStore, SummarizationCapability, TranscriptionCapability, TranscriptionJob,
    TranscriptionSubmission,
};
use visitnote_engine::{
    EngineError, ExecutionGateway, ExecutionObserver, ExecutionStatusSource, LocalExecutor, PollPolicy, StageServices,
    StateMachine, WorkflowSettings,
};
use visitnote_types::{ExecutionStatus, MedicalEntity, StartExecutionRequest, TranscriptionJobStatus, WorkflowState};

/// Completes a job on its first status check, or fails it when configured to.
struct OneCheckTranscription {
    final_status: &'static str,
    submissions: Mutex<Vec<TranscriptionSubmission>>,
}

#[async_trait]
impl TranscriptionCapability for OneCheckTranscription {
    async fn submit(&self, submission: &TranscriptionSubmission) -> Result<TranscriptionJob> {
        self.submissions.lock().expect("lock").push(submission.clone());
        Ok(TranscriptionJob {
            job_name: submission.job_name.clone(),
            status: TranscriptionJobStatus::InProgress,
            language_code: Some(submission.language_code.clone()),
            media_uri: Some(submission.media_uri.clone()),
        })
    }

    async fn get_status(&self, job_name: &str) -> Result<TranscriptionJob> {
        Ok(TranscriptionJob {
            job_name: job_name.to_string(),
            status: TranscriptionJobStatus::from(self.final_status),
            language_code: None,
            media_uri: None,
        })
    }
}

/// Walks each job through its own status script; the last status repeats.
struct PerJobTranscription {
    scripts: Mutex<HashMap<String, Vec<&'static str>>>,
}

impl PerJobTranscription {
    fn new(scripts: &[(&str, &[&'static str])]) -> Self {
        let scripts = scripts
            .iter()
            .map(|(job_name, statuses)| (job_name.to_string(), statuses.iter().rev().copied().collect()))
            .collect();
        Self {
            scripts: Mutex::new(scripts),
        }
    }
}

#[async_trait]
impl TranscriptionCapability for PerJobTranscription {
    async fn submit(&self, submission: &TranscriptionSubmission) -> Result<TranscriptionJob> {
        Ok(TranscriptionJob {
            job_name: submission.job_name.clone(),
            status: TranscriptionJobStatus::InProgress,
            language_code: Some(submission.language_code.clone()),
            media_uri: Some(submission.media_uri.clone()),
        })
    }

    async fn get_status(&self, job_name: &str) -> Result<TranscriptionJob> {
        let mut scripts = self.scripts.lock().expect("lock");
        let script = scripts.get_mut(job_name).expect("scripted job");
        let status = if script.len() > 1 { script.pop() } else { script.last().copied() };
        Ok(TranscriptionJob {
            job_name: job_name.to_string(),
            status: TranscriptionJobStatus::from(status.unwrap_or("IN_PROGRESS")),
            language_code: None,
            media_uri: None,
        })
    }
}

/// Summarizes by echoing the patient's line back.
struct EchoPatient;

#[async_trait]
impl SummarizationCapability for EchoPatient {
    async fn summarize(&self, prompt_text: &str, _max_tokens: u32) -> Result<String> {
        let patient = prompt_text.split("Patient: ").nth(1).unwrap_or_default();
        Ok(format!("Patient said: {}", patient.split('.').next().unwrap_or_default()))
    }
}

struct CannedSummary(Mutex<u32>);

#[async_trait]
impl SummarizationCapability for CannedSummary {
    async fn summarize(&self, prompt_text: &str, _max_tokens: u32) -> Result<String> {
        assert!(prompt_text.contains("I have diabetes"));
        *self.0.lock().expect("lock") += 1;
        Ok("The patient reports diabetes. Co-pay is $20.".to_string())
    }
}

struct KeywordEntities;

#[async_trait]
impl EntityExtractionCapability for KeywordEntities {
    async fn detect_entities(&self, text: &str) -> Result<Vec<MedicalEntity>> {
        let begin = text.find("diabetes").unwrap_or_default() as u64;
        Ok(vec![MedicalEntity {
            text: "diabetes".into(),
            category: "MEDICAL_CONDITION".into(),
            entity_type: "DX_NAME".into(),
            score: Some(0.99),
            begin_offset: Some(begin),
            end_offset: Some(begin + 8),
        }])
    }
}

struct Harness {
    executor: LocalExecutor,
    gateway: ExecutionGateway,
    observer: ExecutionObserver,
    summaries: Arc<CannedSummary>,
    transcription: Arc<OneCheckTranscription>,
    _artifacts: tempfile::TempDir,
}

fn write_transcript(root: &std::path::Path, job_name: &str, transcript: &str) {
    let transcript_dir = root.join("b/audio_transcripts/medical");
    std::fs::create_dir_all(&transcript_dir).expect("mkdir");
    std::fs::write(
        transcript_dir.join(format!("{job_name}.json")),
        json!({ "results": { "transcripts": [{ "transcript": transcript }] } }).to_string(),
    )
    .expect("write transcript");
}

fn harness(final_status: &'static str) -> Harness {
    let artifacts = tempfile::tempdir().expect("tempdir");
    write_transcript(artifacts.path(), "visit-1", "Doctor: what brings you in. Patient: I have diabetes");

    let transcription = Arc::new(OneCheckTranscription {
        final_status,
        submissions: Mutex::new(Vec::new()),
    });
    let summaries = Arc::new(CannedSummary(Mutex::new(0)));
    let services = StageServices {
        transcription: transcription.clone(),
        summarization: summaries.clone(),
        entities: Arc::new(KeywordEntities),
        artifacts: Arc::new(FsArtifactStore::new(artifacts.path())),
    };
    let settings = WorkflowSettings {
        poll: PollPolicy::fixed(Duration::from_secs(30), 8),
        ..Default::default()
    };
    let executor = LocalExecutor::new(StateMachine::new(services, settings));
    let shared = Arc::new(executor.clone());
    Harness {
        gateway: ExecutionGateway::new(shared.clone()),
        observer: ExecutionObserver::new(shared),
        executor,
        summaries,
        transcription,
        _artifacts: artifacts,
    }
}

fn visit_request(language: &str) -> StartExecutionRequest {
    visit_request_for("visit-1", language)
}

fn visit_request_for(job_name: &str, language: &str) -> StartExecutionRequest {
    StartExecutionRequest {
        job_name: Some(job_name.into()),
        job_uri: Some("s3://b/a.mp3".into()),
        output_location: Some("b".into()),
        output_prefix: Some("audio_transcripts".into()),
        language: Some(language.into()),
    }
}

#[tokio::test(start_paused = true)]
async fn visit_is_transcribed_summarized_and_annotated() {
    let harness = harness("COMPLETED");

    let handle = harness.gateway.start_from_wire(visit_request("English")).await.expect("start");
    let outputs = harness
        .observer
        .await_outputs(&handle, Duration::from_secs(5))
        .await
        .expect("outputs");

    let transcription = outputs.transcription.expect("transcription");
    assert_eq!(transcription.status, TranscriptionJobStatus::Completed);
    assert_eq!(transcription.language_code, "en-US");
    let summary = outputs.summarization.expect("summary").summary;
    assert_eq!(summary, "The patient reports diabetes. Co-pay is \\$20.");
    let entities = outputs.entity_extraction.expect("entities").entities;
    assert!(entities.iter().any(|entity| entity.category == "MEDICAL_CONDITION"));

    let submission = harness.transcription.submissions.lock().expect("lock")[0].clone();
    assert_eq!(submission.output_key, "audio_transcripts/medical/visit-1.json");

    let history = harness.executor.execution_history(&handle).await.expect("history");
    assert_eq!(history.count(WorkflowState::Wait), 1);
    assert_eq!(history.transitions.last().map(|transition| transition.state), Some(WorkflowState::Succeed));
}

#[tokio::test(start_paused = true)]
async fn failed_transcription_reaches_the_observer_as_failed() {
    let harness = harness("FAILED");

    let handle = harness.gateway.start_from_wire(visit_request("English")).await.expect("start");
    let error = harness
        .observer
        .await_outputs(&handle, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(
        error,
        EngineError::ExecutionFailed {
            status: "FAILED".into(),
            cause: Some("Conversation analysis Failed".into()),
        }
    );
    assert_eq!(*harness.summaries.0.lock().expect("lock"), 0);
    let snapshot = harness.executor.describe_execution(&handle).await.expect("describe");
    assert!(snapshot.outputs().summarization.is_none());
}

#[tokio::test(start_paused = true)]
async fn unsupported_language_fails_before_transcription() {
    let harness = harness("COMPLETED");

    let handle = harness.gateway.start_from_wire(visit_request("Klingon")).await.expect("start");
    let snapshot = harness
        .observer
        .await_snapshot(&handle, Duration::from_secs(5))
        .await
        .expect("snapshot");

    assert_eq!(snapshot.status, ExecutionStatus::Failed);
    assert_eq!(snapshot.failure.expect("failure").error, "Transcription.UnsupportedLanguage");
    assert!(harness.transcription.submissions.lock().expect("lock").is_empty());
}

#[tokio::test(start_paused = true)]
async fn stopped_executions_are_observed_as_aborted() {
    let harness = harness("IN_PROGRESS");

    let handle = harness.gateway.start_from_wire(visit_request("English")).await.expect("start");
    tokio::time::sleep(Duration::from_secs(40)).await;
    harness.executor.stop_execution(&handle, Some("visit cancelled")).expect("stop");

    let error = harness
        .observer
        .await_outputs(&handle, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(
        error,
        EngineError::ExecutionFailed {
            status: "ABORTED".into(),
            cause: Some("visit cancelled".into()),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_visits_keep_their_own_results() {
    let artifacts = tempfile::tempdir().expect("tempdir");
    write_transcript(artifacts.path(), "visit-1", "Doctor: any pain. Patient: my knee hurts");
    write_transcript(artifacts.path(), "visit-2", "Doctor: how is the cough. Patient: it is worse at night");
    write_transcript(artifacts.path(), "visit-3", "Doctor: any allergies. Patient: penicillin");
    let services = StageServices {
        transcription: Arc::new(PerJobTranscription::new(&[
            ("visit-1", ["IN_PROGRESS", "IN_PROGRESS", "COMPLETED"].as_slice()),
            ("visit-2", ["IN_PROGRESS", "FAILED"].as_slice()),
            ("visit-3", ["COMPLETED"].as_slice()),
        ])),
        summarization: Arc::new(EchoPatient),
        entities: Arc::new(KeywordEntities),
        artifacts: Arc::new(FsArtifactStore::new(artifacts.path())),
    };
    let settings = WorkflowSettings {
        poll: PollPolicy::fixed(Duration::from_secs(30), 8),
        ..Default::default()
    };
    let executor = LocalExecutor::new(StateMachine::new(services, settings));
    let shared = Arc::new(executor.clone());
    let gateway = ExecutionGateway::new(shared.clone());
    let observer = ExecutionObserver::new(shared);

    let first = gateway.start_from_wire(visit_request_for("visit-1", "English")).await.expect("start");
    let second = gateway.start_from_wire(visit_request_for("visit-2", "English")).await.expect("start");
    let third = gateway.start_from_wire(visit_request_for("visit-3", "English")).await.expect("start");
    let (first, second, third) = tokio::join!(
        observer.await_snapshot(&first, Duration::from_secs(5)),
        observer.await_snapshot(&second, Duration::from_secs(5)),
        observer.await_snapshot(&third, Duration::from_secs(5)),
    );
    let (first, second, third) = (first.expect("first"), second.expect("second"), third.expect("third"));

    assert_eq!(first.status, ExecutionStatus::Succeeded);
    let outputs = first.outputs();
    assert_eq!(outputs.transcription.as_ref().expect("transcription").job_name, "visit-1");
    assert_eq!(outputs.summarization.as_ref().expect("summary").summary, "Patient said: my knee hurts");

    assert_eq!(third.status, ExecutionStatus::Succeeded);
    let outputs = third.outputs();
    assert_eq!(outputs.transcription.as_ref().expect("transcription").job_name, "visit-3");
    assert_eq!(outputs.summarization.as_ref().expect("summary").summary, "Patient said: penicillin");

    assert_eq!(second.status, ExecutionStatus::Failed);
    let outputs = second.outputs();
    let transcription = outputs.transcription.as_ref().expect("transcription");
    assert_eq!(transcription.job_name, "visit-2");
    assert_eq!(transcription.status, TranscriptionJobStatus::Failed);
    assert!(outputs.summarization.is_none());
    assert!(outputs.entity_extraction.is_none());

    assert_eq!(executor.store().list().len(), 3);
}

#[tokio::test]
async fn missing_fields_are_rejected_before_launch() {
    let harness = harness("COMPLETED");
    let mut request = visit_request("English");
    request.output_prefix = None;

    let error = harness.gateway.start_from_wire(request).await.unwrap_err();

    assert_eq!(error, EngineError::InvalidRequest("missing required fields: output_prefix".into()));
    assert!(harness.executor.store().list().is_empty());
}
