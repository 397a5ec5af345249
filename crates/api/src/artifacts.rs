//! Transcript artifact stores.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use crate::capability::ArtifactStore;
use crate::client::{CapabilityClient, encode_segment};

/// Reads artifacts from `<root>/<location>/<key>` on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an object path, refusing anything that would escape the root.
    pub fn object_path(&self, location: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(location).join(key);
        if location.is_empty() || key.is_empty() {
            return Err(anyhow!("artifact location and key must be non-empty"));
        }
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(anyhow!("artifact path '{}' must be relative and stay inside the store", relative.display()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn get_object(&self, location: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(location, key)?;
        debug!(path = %path.display(), "reading artifact");
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("read artifact {}", path.display()))
    }
}

/// Reads artifacts with `GET <base>/<location>/<key>`.
#[derive(Debug, Clone)]
pub struct HttpArtifactStore {
    client: CapabilityClient,
}

impl HttpArtifactStore {
    pub fn new(client: CapabilityClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn get_object(&self, location: &str, key: &str) -> Result<Vec<u8>> {
        let encoded_key = key.split('/').map(encode_segment).collect::<Vec<_>>().join("/");
        let path = format!("/{}/{}", encode_segment(location), encoded_key);
        let response = self
            .client
            .request(Method::GET, &path)
            .send()
            .await
            .map_err(|error| anyhow!("artifact request failed: {error}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("artifact store returned HTTP {} for {}/{}", status.as_u16(), location, key));
        }
        let bytes = response.bytes().await.context("read artifact body")?;
        Ok(bytes.to_vec())
    }
}
