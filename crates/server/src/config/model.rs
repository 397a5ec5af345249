//! Data model of the visitnote configuration document.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use visitnote_engine::{DEFAULT_OBSERVER_INTERVAL, WorkflowSettings, poll::duration_secs};
use visitnote_util::InterpolationError;

use crate::config::ValidationError;

/// Model identifier sent with every summarization request unless configured otherwise.
pub const DEFAULT_SUMMARY_MODEL: &str = "anthropic.claude-v2";

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VisitnoteConfig {
    pub http_server: HttpServerConfig,
    pub workflow: WorkflowSettings,
    pub capabilities: CapabilitiesConfig,
    pub artifacts: ArtifactsConfig,
    pub observer: ObserverConfig,
}

/// HTTP front door settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct HttpServerConfig {
    /// Socket address to listen on, for example `127.0.0.1:8080`.
    pub bind_address: String,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Endpoints of the three external capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CapabilitiesConfig {
    /// Per-request timeout applied to every capability call.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    pub transcription: EndpointConfig,
    pub summarization: SummarizationEndpointConfig,
    pub entities: EndpointConfig,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            transcription: EndpointConfig::local(9101),
            summarization: SummarizationEndpointConfig::default(),
            entities: EndpointConfig::local(9103),
        }
    }
}

/// Base URL plus default headers for one capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EndpointConfig {
    pub base_url: String,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
}

impl EndpointConfig {
    fn local(port: u16) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            headers: IndexMap::new(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::local(9100)
    }
}

/// Summarization endpoint, which also names the model to invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SummarizationEndpointConfig {
    pub base_url: String,
    pub headers: IndexMap<String, String>,
    pub model_id: String,
}

impl Default for SummarizationEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9102".to_string(),
            headers: IndexMap::new(),
            model_id: DEFAULT_SUMMARY_MODEL.to_string(),
        }
    }
}

/// Where transcript artifacts are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArtifactsConfig {
    /// `<root>/<output_location>/<key>` on the local filesystem.
    Filesystem { root: String },
    /// `GET {baseUrl}/{output_location}/{key}`.
    #[serde(rename_all = "camelCase")]
    Http {
        base_url: String,
        #[serde(default)]
        headers: IndexMap<String, String>,
    },
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        ArtifactsConfig::Filesystem {
            root: "./artifacts".to_string(),
        }
    }
}

/// Defaults for callers awaiting an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ObserverConfig {
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    /// Give up after this many seconds; unset waits indefinitely.
    pub deadline_secs: Option<u64>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_OBSERVER_INTERVAL,
            deadline_secs: None,
        }
    }
}

impl ObserverConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}
