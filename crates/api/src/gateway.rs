//! Client for the visitnote HTTP front door.

use std::time::Duration;

use indexmap::IndexMap;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use visitnote_types::{
    ErrorBody, ExecutionHandle, ExecutionHistory, ExecutionSnapshot, StartExecutionRequest, StartExecutionResponse,
    StopExecutionRequest,
};

use crate::client::{CapabilityClient, encode_segment};

/// Failures talking to the front door, split by who is at fault.
#[derive(Debug, Error)]
pub enum GatewayClientError {
    #[error("gateway rejected the request ({status}): {}", body.message)]
    Rejected { status: u16, body: ErrorBody },

    #[error("execution not found: {0}")]
    NotFound(ExecutionHandle),

    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    #[error("unexpected gateway response: {0}")]
    Protocol(String),
}

/// Starts and inspects executions through a running server.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: CapabilityClient,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = CapabilityClient::new("gateway", base_url, &IndexMap::new(), timeout)?;
        Ok(Self { client })
    }

    pub fn base_url(&self) -> &str {
        &self.client.base_url
    }

    /// `POST /api`: returns the new execution's handle.
    pub async fn start_execution(&self, request: &StartExecutionRequest) -> Result<StartExecutionResponse, GatewayClientError> {
        let builder = self.client.request(Method::POST, "/api").json(request);
        self.send(builder, None).await
    }

    /// `GET /executions/{handle}`.
    pub async fn describe_execution(&self, handle: &ExecutionHandle) -> Result<ExecutionSnapshot, GatewayClientError> {
        let path = format!("/executions/{}", encode_segment(handle.as_str()));
        self.send(self.client.request(Method::GET, &path), Some(handle)).await
    }

    /// `GET /executions/{handle}/history`.
    pub async fn execution_history(&self, handle: &ExecutionHandle) -> Result<ExecutionHistory, GatewayClientError> {
        let path = format!("/executions/{}/history", encode_segment(handle.as_str()));
        self.send(self.client.request(Method::GET, &path), Some(handle)).await
    }

    /// `POST /executions/{handle}/stop`, optionally recording why.
    pub async fn stop_execution(
        &self,
        handle: &ExecutionHandle,
        cause: Option<&str>,
    ) -> Result<ExecutionSnapshot, GatewayClientError> {
        let path = format!("/executions/{}/stop", encode_segment(handle.as_str()));
        let body = StopExecutionRequest {
            cause: cause.map(str::to_string),
        };
        self.send(self.client.request(Method::POST, &path).json(&body), Some(handle)).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        handle: Option<&ExecutionHandle>,
    ) -> Result<T, GatewayClientError> {
        let response = builder
            .send()
            .await
            .map_err(|error| GatewayClientError::Unreachable(error.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|error| GatewayClientError::Unreachable(error.to_string()))?;
        debug!(status = status.as_u16(), "gateway responded");

        if status == StatusCode::NOT_FOUND
            && let Some(handle) = handle
        {
            return Err(GatewayClientError::NotFound(handle.clone()));
        }
        if status == StatusCode::SERVICE_UNAVAILABLE {
            let message = serde_json::from_str::<ErrorBody>(&text).map(|body| body.message).unwrap_or(text);
            return Err(GatewayClientError::Unreachable(message));
        }
        if !status.is_success() {
            let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| ErrorBody {
                error: "HttpError".to_string(),
                message: text.trim().to_string(),
            });
            return Err(GatewayClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&text).map_err(|error| GatewayClientError::Protocol(error.to_string()))
    }
}
