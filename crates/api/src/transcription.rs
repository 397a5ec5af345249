//! HTTP-backed transcription capability.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use visitnote_types::TranscriptionJobStatus;

use crate::capability::{TranscriptionCapability, TranscriptionJob, TranscriptionSubmission};
use crate::client::{CapabilityClient, encode_segment};

const JOBS_PATH: &str = "/medical-transcription-jobs";
const WRAPPER_KEY: &str = "MedicalTranscriptionJob";

/// Talks to a medical transcription service over its JSON job API.
#[derive(Debug, Clone)]
pub struct HttpTranscriptionCapability {
    client: CapabilityClient,
}

impl HttpTranscriptionCapability {
    pub fn new(client: CapabilityClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TranscriptionCapability for HttpTranscriptionCapability {
    async fn submit(&self, submission: &TranscriptionSubmission) -> Result<TranscriptionJob> {
        debug!(job_name = %submission.job_name, language_code = %submission.language_code, "submitting transcription job");
        let body = json!({
            "MedicalTranscriptionJobName": submission.job_name,
            "LanguageCode": submission.language_code,
            "Media": { "MediaFileUri": submission.media_uri },
            "OutputBucketName": submission.output_bucket,
            "OutputKey": submission.output_key,
            "Specialty": submission.specialty,
            "Type": submission.kind,
        });
        let payload = self
            .client
            .send_json(self.client.request(Method::POST, JOBS_PATH).json(&body))
            .await?;
        normalize_job_payload(payload)
    }

    async fn get_status(&self, job_name: &str) -> Result<TranscriptionJob> {
        let path = format!("{}/{}", JOBS_PATH, encode_segment(job_name));
        let payload = self.client.send_json(self.client.request(Method::GET, &path)).await?;
        normalize_job_payload(payload)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawTranscriptionJob {
    medical_transcription_job_name: String,
    transcription_job_status: String,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    media: Option<RawMedia>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawMedia {
    #[serde(default)]
    media_file_uri: Option<String>,
}

/// Reduce every response shape the service produces to one [`TranscriptionJob`].
///
/// Accepted shapes: `{"MedicalTranscriptionJob": {...}}`, the bare job object,
/// or a one-element array holding either of those.
pub fn normalize_job_payload(payload: Value) -> Result<TranscriptionJob> {
    let unwrapped_array = match payload {
        Value::Array(items) => items
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("transcription response was an empty array"))?,
        other => other,
    };
    let job_value = match unwrapped_array {
        Value::Object(mut map) => match map.remove(WRAPPER_KEY) {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    };

    let raw: RawTranscriptionJob = serde_json::from_value(job_value).context("decode transcription job")?;
    Ok(TranscriptionJob {
        job_name: raw.medical_transcription_job_name,
        status: TranscriptionJobStatus::from(raw.transcription_job_status),
        language_code: raw.language_code,
        media_uri: raw.media.and_then(|media| media.media_file_uri),
    })
}
