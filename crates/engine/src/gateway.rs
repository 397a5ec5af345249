//! Entry point that validates job requests and launches executions.

use std::sync::Arc;

use tracing::info;
use visitnote_types::{ExecutionHandle, JobRequest, Language, ResultEnvelope, StartExecutionRequest};

use crate::{EngineError, launcher::ExecutionLauncher};

/// Validates requests and hands them to an [`ExecutionLauncher`].
#[derive(Clone)]
pub struct ExecutionGateway {
    launcher: Arc<dyn ExecutionLauncher>,
}

impl ExecutionGateway {
    pub fn new(launcher: Arc<dyn ExecutionLauncher>) -> Self {
        Self { launcher }
    }

    /// Start one execution for `request` and return its handle without waiting for it.
    ///
    /// Every field must be non-empty. Language support is not checked here;
    /// an unsupported language fails the execution at its first state.
    pub async fn start(&self, request: JobRequest) -> Result<ExecutionHandle, EngineError> {
        validate_job_request(&request)?;
        let job_name = request.job_name.clone();
        let handle = self.launcher.start_execution(ResultEnvelope::new(request)).await?;
        info!(handle = %handle, job_name = %job_name, "execution accepted");
        Ok(handle)
    }

    /// Start from the wire shape, naming any missing field in the error.
    pub async fn start_from_wire(&self, request: StartExecutionRequest) -> Result<ExecutionHandle, EngineError> {
        self.start(job_request_from_wire(request)?).await
    }
}

/// Convert the wire body to a [`JobRequest`], rejecting missing or blank fields.
pub fn job_request_from_wire(request: StartExecutionRequest) -> Result<JobRequest, EngineError> {
    let fields = [
        ("job_name", &request.job_name),
        ("job_uri", &request.job_uri),
        ("output_location", &request.output_location),
        ("output_prefix", &request.output_prefix),
        ("language", &request.language),
    ];
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.as_deref().is_none_or(|text| text.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::InvalidRequest(format!("missing required fields: {}", missing.join(", "))));
    }

    Ok(JobRequest {
        job_name: request.job_name.unwrap_or_default(),
        audio_uri: request.job_uri.unwrap_or_default(),
        output_location: request.output_location.unwrap_or_default(),
        output_prefix: request.output_prefix.unwrap_or_default(),
        language: Language::from(request.language.unwrap_or_default()),
    })
}

fn validate_job_request(request: &JobRequest) -> Result<(), EngineError> {
    let fields = [
        ("job_name", request.job_name.as_str()),
        ("job_uri", request.audio_uri.as_str()),
        ("output_location", request.output_location.as_str()),
        ("output_prefix", request.output_prefix.as_str()),
        ("language", request.language.name()),
    ];
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EngineError::InvalidRequest(format!("missing required fields: {}", missing.join(", "))))
    }
}
