//! Configuration validation.

use std::net::SocketAddr;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;
use url::Url;
use visitnote_api::validate_base_url;

use crate::config::{ArtifactsConfig, VisitnoteConfig};

/// Validate the entire configuration.
pub fn validate_config(config: &VisitnoteConfig) -> Result<(), ValidationError> {
    validate_bind_address(&config.http_server.bind_address)?;

    let capabilities = &config.capabilities;
    validate_endpoint("capabilities.transcription", &capabilities.transcription.base_url, &capabilities.transcription.headers)?;
    validate_endpoint("capabilities.summarization", &capabilities.summarization.base_url, &capabilities.summarization.headers)?;
    validate_endpoint("capabilities.entities", &capabilities.entities.base_url, &capabilities.entities.headers)?;
    if capabilities.summarization.model_id.trim().is_empty() {
        return Err(invalid("capabilities.summarization.modelId", "must not be empty"));
    }
    if capabilities.request_timeout.is_zero() {
        return Err(invalid("capabilities.requestTimeout", "must be greater than zero"));
    }

    match &config.artifacts {
        ArtifactsConfig::Filesystem { root } if root.trim().is_empty() => {
            return Err(invalid("artifacts.root", "must not be empty"));
        }
        ArtifactsConfig::Filesystem { .. } => {}
        ArtifactsConfig::Http { base_url, headers } => validate_endpoint("artifacts", base_url, headers)?,
    }

    let workflow = &config.workflow;
    if workflow.poll.interval.is_zero() {
        return Err(invalid("workflow.poll.interval", "must be greater than zero"));
    }
    if workflow.poll.max_attempts == 0 {
        return Err(invalid("workflow.poll.maxAttempts", "must be at least 1"));
    }
    if !(workflow.poll.backoff_multiplier.is_finite() && workflow.poll.backoff_multiplier >= 1.0) {
        return Err(invalid("workflow.poll.backoffMultiplier", "must be a finite number >= 1.0"));
    }
    if workflow.poll.max_interval < workflow.poll.interval {
        return Err(invalid("workflow.poll.maxInterval", "must not be shorter than the poll interval"));
    }
    if workflow.execution_timeout <= workflow.poll.interval {
        return Err(invalid("workflow.executionTimeout", "must be longer than the poll interval"));
    }
    if workflow.summary_max_tokens == 0 {
        return Err(invalid("workflow.summaryMaxTokens", "must be greater than zero"));
    }
    if workflow.max_retained_executions == 0 {
        return Err(invalid("workflow.maxRetainedExecutions", "must be at least 1"));
    }

    if config.observer.interval.is_zero() {
        return Err(invalid("observer.interval", "must be greater than zero"));
    }

    debug!("validated visitnote configuration");
    Ok(())
}

/// Parse a bind address such as `127.0.0.1:8080`.
pub fn validate_bind_address(address: &str) -> Result<SocketAddr, ValidationError> {
    address
        .trim()
        .parse::<SocketAddr>()
        .map_err(|error| ValidationError::InvalidBindAddress {
            address: address.to_string(),
            reason: error.to_string(),
        })
}

fn validate_endpoint(field: &str, base_url: &str, headers: &IndexMap<String, String>) -> Result<(), ValidationError> {
    Url::parse(base_url).map_err(|error| ValidationError::InvalidUrl {
        field: field.to_string(),
        reason: error.to_string(),
    })?;
    validate_base_url(base_url).map_err(|error| ValidationError::InvalidUrl {
        field: field.to_string(),
        reason: error.to_string(),
    })?;
    for name in headers.keys() {
        validate_header_name(name)?;
    }
    Ok(())
}

/// Validate an HTTP header name.
fn validate_header_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::InvalidHeaderName {
            name: name.to_string(),
            reason: "Header name cannot be empty".to_string(),
        });
    }

    if name.chars().any(|c| c.is_control() || c.is_whitespace() || c == ':') {
        return Err(ValidationError::InvalidHeaderName {
            name: name.to_string(),
            reason: "Header name cannot contain whitespace, colons or control characters".to_string(),
        });
    }

    Ok(())
}

fn invalid(field: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Errors that can occur during validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid bind address '{address}': {reason}")]
    InvalidBindAddress { address: String, reason: String },

    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl { field: String, reason: String },

    #[error("Invalid HTTP header name '{name}': {reason}")]
    InvalidHeaderName { name: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}
