//! HTTP front door: start, describe, inspect and stop executions.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use visitnote_engine::{EngineError, ExecutionGateway, ExecutionStatusSource, LocalExecutor};
use visitnote_types::{ErrorBody, ExecutionHandle, StartExecutionRequest, StartExecutionResponse, StopExecutionRequest};

/// Shared request state.
#[derive(Clone)]
struct AppState {
    gateway: Arc<ExecutionGateway>,
    executor: LocalExecutor,
}

/// Error response carrying the stable error code.
struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::InvalidRequest(_) | EngineError::UnsupportedLanguage { .. } => StatusCode::BAD_REQUEST,
            EngineError::ExecutionNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::DownstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            error: self.0.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the front door router around an executor.
pub fn router(executor: LocalExecutor) -> Router {
    let gateway = Arc::new(ExecutionGateway::new(Arc::new(executor.clone())));
    Router::new()
        .route("/api", post(start_execution))
        .route("/executions/{handle}", get(describe_execution))
        .route("/executions/{handle}/history", get(execution_history))
        .route("/executions/{handle}/stop", post(stop_execution))
        .route("/health", get(health))
        .with_state(AppState { gateway, executor })
}

async fn start_execution(
    State(state): State<AppState>,
    payload: Result<Json<StartExecutionRequest>, JsonRejection>,
) -> Result<Json<StartExecutionResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| EngineError::InvalidRequest(rejection.body_text()))?;
    let handle = state.gateway.start_from_wire(request).await?;
    Ok(Json(StartExecutionResponse { sm_execution_arn: handle }))
}

async fn describe_execution(State(state): State<AppState>, Path(handle): Path<String>) -> Result<Response, ApiError> {
    let snapshot = state.executor.describe_execution(&ExecutionHandle::from(handle)).await?;
    Ok(Json(snapshot).into_response())
}

async fn execution_history(State(state): State<AppState>, Path(handle): Path<String>) -> Result<Response, ApiError> {
    let history = state.executor.execution_history(&ExecutionHandle::from(handle)).await?;
    Ok(Json(history).into_response())
}

/// The body is optional; an empty body stops with the default cause.
async fn stop_execution(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = parse_stop_request(&body)?;
    let snapshot = state
        .executor
        .stop_execution(&ExecutionHandle::from(handle), request.cause.as_deref())?;
    Ok(Json(snapshot).into_response())
}

fn parse_stop_request(body: &[u8]) -> Result<StopExecutionRequest, EngineError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StopExecutionRequest::default());
    }
    serde_json::from_slice(body).map_err(|error| EngineError::InvalidRequest(format!("invalid stop request: {error}")))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Host configuration for the front door.
pub struct GatewayServer {
    bind_address: SocketAddr,
    executor: LocalExecutor,
}

impl GatewayServer {
    pub fn new(bind_address: SocketAddr, executor: LocalExecutor) -> Self {
        Self { bind_address, executor }
    }

    /// Start the server and return a handle for runtime inspection and shutdown.
    pub async fn start(self) -> Result<RunningGatewayServer> {
        let cancellation_token = CancellationToken::new();
        let router = router(self.executor.clone());
        let listener = tokio::net::TcpListener::bind(self.bind_address).await?;
        let bound_address = listener.local_addr()?;

        let server_handle = tokio::spawn({
            let shutdown = cancellation_token.child_token();
            async move {
                if let Err(error) = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown.cancelled().await;
                    })
                    .await
                {
                    warn!(%error, "front door server exited with an error");
                }
            }
        });

        info!(address = %bound_address, "visitnote front door listening");
        Ok(RunningGatewayServer {
            bind_address: bound_address,
            cancellation_token,
            server_handle,
            executor: self.executor,
        })
    }
}

/// Runtime handle for a running front door.
pub struct RunningGatewayServer {
    bind_address: SocketAddr,
    cancellation_token: CancellationToken,
    server_handle: JoinHandle<()>,
    executor: LocalExecutor,
}

impl RunningGatewayServer {
    /// Return the bound socket address for the running server.
    pub fn bound_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Stop accepting requests, abort running executions, and wait for the server task.
    pub async fn stop(self) -> Result<()> {
        self.cancellation_token.cancel();
        self.executor.shutdown();
        self.server_handle
            .await
            .map_err(|error| anyhow!("front door server task failed: {error}"))?;
        info!(address = %self.bind_address, "visitnote front door stopped");
        Ok(())
    }
}

/// Resolve the bind address, preferring an explicit override over the configured one.
pub fn resolve_bind_address(override_address: Option<&str>, configured: &str) -> Result<SocketAddr> {
    let address = override_address.unwrap_or(configured);
    let parsed: SocketAddr = address
        .trim()
        .parse()
        .map_err(|error| anyhow!("invalid bind address '{address}': {error}"))?;
    if !is_loopback(parsed.ip()) {
        warn!(address = %parsed, "front door is bound to a non-loopback address");
    }
    Ok(parsed)
}

fn is_loopback(address: IpAddr) -> bool {
    match address {
        IpAddr::V4(ip) => ip.is_loopback(),
        IpAddr::V6(ip) => ip.is_loopback(),
    }
}
