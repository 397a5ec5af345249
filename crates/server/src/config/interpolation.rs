//! `${env:NAME}` interpolation over every string value of the configuration.

use indexmap::IndexMap;
use tracing::debug;
use visitnote_util::{InterpolationError, interpolate_string};

use crate::config::{ArtifactsConfig, VisitnoteConfig};

/// Interpolate environment variables in the configuration.
pub fn interpolate_config(config: &mut VisitnoteConfig) -> Result<(), InterpolationError> {
    interpolate_value(&mut config.http_server.bind_address)?;

    let capabilities = &mut config.capabilities;
    interpolate_value(&mut capabilities.transcription.base_url)?;
    interpolate_headers(&mut capabilities.transcription.headers)?;
    interpolate_value(&mut capabilities.summarization.base_url)?;
    interpolate_value(&mut capabilities.summarization.model_id)?;
    interpolate_headers(&mut capabilities.summarization.headers)?;
    interpolate_value(&mut capabilities.entities.base_url)?;
    interpolate_headers(&mut capabilities.entities.headers)?;

    match &mut config.artifacts {
        ArtifactsConfig::Filesystem { root } => interpolate_value(root)?,
        ArtifactsConfig::Http { base_url, headers } => {
            interpolate_value(base_url)?;
            interpolate_headers(headers)?;
        }
    }

    debug!("interpolated visitnote configuration");
    Ok(())
}

fn interpolate_value(value: &mut String) -> Result<(), InterpolationError> {
    *value = interpolate_string(value)?;
    Ok(())
}

fn interpolate_headers(headers: &mut IndexMap<String, String>) -> Result<(), InterpolationError> {
    for value in headers.values_mut() {
        interpolate_value(value)?;
    }
    Ok(())
}
