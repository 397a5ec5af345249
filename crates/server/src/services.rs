//! Wiring from configuration to live capability clients and the executor.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use visitnote_api::{
    ArtifactStore, CapabilityClient, FsArtifactStore, HttpArtifactStore, HttpEntityExtractionCapability,
    HttpSummarizationCapability, HttpTranscriptionCapability,
};
use visitnote_engine::{LocalExecutor, StateMachine, stages::StageServices};
use visitnote_util::expand_tilde;

use crate::config::{ArtifactsConfig, VisitnoteConfig};

/// Build the HTTP/filesystem capability clients named by the configuration.
pub fn build_stage_services(config: &VisitnoteConfig) -> Result<StageServices> {
    let capabilities = &config.capabilities;
    let timeout = capabilities.request_timeout;

    let transcription = CapabilityClient::new(
        "transcription",
        &capabilities.transcription.base_url,
        &capabilities.transcription.headers,
        timeout,
    )
    .context("building transcription client")?;
    let summarization = CapabilityClient::new(
        "summarization",
        &capabilities.summarization.base_url,
        &capabilities.summarization.headers,
        timeout,
    )
    .context("building summarization client")?;
    let entities = CapabilityClient::new("entities", &capabilities.entities.base_url, &capabilities.entities.headers, timeout)
        .context("building entity extraction client")?;

    let artifacts: Arc<dyn ArtifactStore> = match &config.artifacts {
        ArtifactsConfig::Filesystem { root } => Arc::new(FsArtifactStore::new(expand_tilde(root))),
        ArtifactsConfig::Http { base_url, headers } => {
            let client =
                CapabilityClient::new("artifacts", base_url, headers, timeout).context("building artifact store client")?;
            Arc::new(HttpArtifactStore::new(client))
        }
    };

    Ok(StageServices {
        transcription: Arc::new(HttpTranscriptionCapability::new(transcription)),
        summarization: Arc::new(HttpSummarizationCapability::new(
            summarization,
            capabilities.summarization.model_id.clone(),
        )),
        entities: Arc::new(HttpEntityExtractionCapability::new(entities)),
        artifacts,
    })
}

/// Build an in-process executor driving the configured capabilities.
pub fn build_executor(config: &VisitnoteConfig) -> Result<LocalExecutor> {
    let services = build_stage_services(config)?;
    info!(
        poll_interval = ?config.workflow.poll.interval,
        max_poll_attempts = config.workflow.poll.max_attempts,
        execution_timeout = ?config.workflow.execution_timeout,
        "execution engine configured"
    );
    Ok(LocalExecutor::new(StateMachine::new(services, config.workflow.clone())))
}
