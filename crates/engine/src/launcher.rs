//! Where executions run, and how callers reach them.
//!
//! [`ExecutionLauncher`] and [`ExecutionStatusSource`] are the seams between
//! the gateway/observer and whatever hosts the state machine. [`LocalExecutor`]
//! runs executions as Tokio tasks in this process; the remote implementations
//! for [`GatewayClient`] talk to a server hosting one.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use visitnote_api::{GatewayClient, GatewayClientError};
use visitnote_types::{
    ExecutionHandle, ExecutionHistory, ExecutionSnapshot, ExecutionStatus, ResultEnvelope, StartExecutionRequest,
};

use crate::{EngineError, machine::StateMachine, store::ExecutionStore};

/// Starts executions without waiting for them.
#[async_trait]
pub trait ExecutionLauncher: Send + Sync {
    /// Begin a new execution seeded with `envelope` and return its handle immediately.
    async fn start_execution(&self, envelope: ResultEnvelope) -> Result<ExecutionHandle, EngineError>;
}

/// Read access to execution status and history.
#[async_trait]
pub trait ExecutionStatusSource: Send + Sync {
    async fn describe_execution(&self, handle: &ExecutionHandle) -> Result<ExecutionSnapshot, EngineError>;

    async fn execution_history(&self, handle: &ExecutionHandle) -> Result<ExecutionHistory, EngineError>;
}

/// Runs executions as background tasks of the current Tokio runtime.
#[derive(Clone)]
pub struct LocalExecutor {
    machine: Arc<StateMachine>,
    store: ExecutionStore,
    cancellations: Arc<Mutex<HashMap<ExecutionHandle, CancellationToken>>>,
    shutdown: CancellationToken,
}

impl LocalExecutor {
    pub fn new(machine: StateMachine) -> Self {
        let store = ExecutionStore::with_retention(machine.settings().max_retained_executions);
        Self {
            machine: Arc::new(machine),
            store,
            cancellations: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &ExecutionStore {
        &self.store
    }

    /// Stop a running execution; it ends `ABORTED`. Stopping a finished execution is a no-op.
    ///
    /// A non-blank `cause` replaces the default failure cause.
    pub fn stop_execution(&self, handle: &ExecutionHandle, cause: Option<&str>) -> Result<ExecutionSnapshot, EngineError> {
        let token = self
            .cancellations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle);
        if let Some(token) = token {
            token.cancel();
            let mut failure = EngineError::Cancelled.to_failure();
            if let Some(cause) = cause.map(str::trim).filter(|cause| !cause.is_empty()) {
                failure.cause = cause.to_string();
            }
            self.store.finish(handle, ExecutionStatus::Aborted, Some(failure), None);
            info!(handle = %handle, "execution stop requested");
        }
        self.store
            .snapshot(handle)
            .ok_or_else(|| EngineError::ExecutionNotFound(handle.clone()))
    }

    /// Cancel every running execution and refuse new ones.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<_> = self
            .cancellations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        for handle in handles {
            let _ = self.stop_execution(&handle, Some("executor shut down"));
        }
    }
}

#[async_trait]
impl ExecutionLauncher for LocalExecutor {
    async fn start_execution(&self, envelope: ResultEnvelope) -> Result<ExecutionHandle, EngineError> {
        if self.shutdown.is_cancelled() {
            return Err(EngineError::DownstreamUnavailable("executor is shutting down".into()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|error| EngineError::DownstreamUnavailable(format!("no async runtime to run on: {error}")))?;

        let job_name = envelope.input().job_name.clone();
        let handle = ExecutionHandle::generate(&job_name);
        self.store
            .try_create(handle.clone(), envelope.clone())
            .map_err(|existing| EngineError::InvalidRequest(format!("job '{job_name}' is already running as {existing}")))?;
        let cancel = self.shutdown.child_token();
        self.cancellations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.clone(), cancel.clone());

        let machine = self.machine.clone();
        let store = self.store.clone();
        let cancellations = self.cancellations.clone();
        let task_handle = handle.clone();
        runtime.spawn(async move {
            let status = machine.run(task_handle.clone(), envelope, &store, cancel).await;
            cancellations
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&task_handle);
            debug!(handle = %task_handle, status = %status, "execution task finished");
        });

        info!(handle = %handle, job_name = %job_name, "execution launched");
        Ok(handle)
    }
}

#[async_trait]
impl ExecutionStatusSource for LocalExecutor {
    async fn describe_execution(&self, handle: &ExecutionHandle) -> Result<ExecutionSnapshot, EngineError> {
        self.store
            .snapshot(handle)
            .ok_or_else(|| EngineError::ExecutionNotFound(handle.clone()))
    }

    async fn execution_history(&self, handle: &ExecutionHandle) -> Result<ExecutionHistory, EngineError> {
        self.store
            .history(handle)
            .ok_or_else(|| EngineError::ExecutionNotFound(handle.clone()))
    }
}

fn map_gateway_error(error: GatewayClientError) -> EngineError {
    match error {
        GatewayClientError::NotFound(handle) => EngineError::ExecutionNotFound(handle),
        GatewayClientError::Rejected { body, .. } if body.error == "InvalidRequest" => EngineError::InvalidRequest(body.message),
        GatewayClientError::Rejected { status, body } => {
            EngineError::DownstreamUnavailable(format!("gateway returned {status}: {}", body.message))
        }
        GatewayClientError::Unreachable(message) | GatewayClientError::Protocol(message) => {
            EngineError::DownstreamUnavailable(message)
        }
    }
}

#[async_trait]
impl ExecutionLauncher for GatewayClient {
    async fn start_execution(&self, envelope: ResultEnvelope) -> Result<ExecutionHandle, EngineError> {
        let input = envelope.input();
        let request = StartExecutionRequest {
            job_name: Some(input.job_name.clone()),
            job_uri: Some(input.audio_uri.clone()),
            output_location: Some(input.output_location.clone()),
            output_prefix: Some(input.output_prefix.clone()),
            language: Some(input.language.name().to_string()),
        };
        let response = GatewayClient::start_execution(self, &request)
            .await
            .map_err(map_gateway_error)?;
        Ok(response.sm_execution_arn)
    }
}

#[async_trait]
impl ExecutionStatusSource for GatewayClient {
    async fn describe_execution(&self, handle: &ExecutionHandle) -> Result<ExecutionSnapshot, EngineError> {
        GatewayClient::describe_execution(self, handle)
            .await
            .map_err(map_gateway_error)
    }

    async fn execution_history(&self, handle: &ExecutionHandle) -> Result<ExecutionHistory, EngineError> {
        GatewayClient::execution_history(self, handle)
            .await
            .map_err(map_gateway_error)
    }
}
