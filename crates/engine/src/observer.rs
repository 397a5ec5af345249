//! Waits for an execution to finish and hands back its outputs.

use std::{sync::Arc, time::Duration};

use tokio::time::Instant;
use tracing::{debug, info};
use visitnote_types::{ExecutionHandle, ExecutionSnapshot, ExecutionStatus, Outputs};

use crate::{EngineError, launcher::ExecutionStatusSource};

/// Default delay between status queries.
pub const DEFAULT_OBSERVER_INTERVAL: Duration = Duration::from_secs(5);

/// Polls an [`ExecutionStatusSource`] until an execution leaves `RUNNING`.
#[derive(Clone)]
pub struct ExecutionObserver {
    source: Arc<dyn ExecutionStatusSource>,
    deadline: Option<Duration>,
}

impl ExecutionObserver {
    pub fn new(source: Arc<dyn ExecutionStatusSource>) -> Self {
        Self { source, deadline: None }
    }

    /// Give up with [`EngineError::ExecutionTimeout`] after `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Block until `handle` is terminal and return its final snapshot, whatever the status.
    pub async fn await_snapshot(&self, handle: &ExecutionHandle, poll_interval: Duration) -> Result<ExecutionSnapshot, EngineError> {
        let started = Instant::now();
        loop {
            let snapshot = self.source.describe_execution(handle).await?;
            if snapshot.status.is_terminal() {
                info!(handle = %handle, status = %snapshot.status, "execution finished");
                return Ok(snapshot);
            }

            if let Some(limit) = self.deadline
                && started.elapsed() + poll_interval > limit
            {
                return Err(EngineError::ExecutionTimeout { limit });
            }
            debug!(handle = %handle, state = %snapshot.state, "execution still running");
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Block until `handle` is terminal and return its outputs.
    ///
    /// Any status other than `SUCCEEDED` is an [`EngineError::ExecutionFailed`]
    /// carrying that status and the recorded cause.
    pub async fn await_outputs(&self, handle: &ExecutionHandle, poll_interval: Duration) -> Result<Outputs, EngineError> {
        let snapshot = self.await_snapshot(handle, poll_interval).await?;
        match snapshot.status {
            ExecutionStatus::Succeeded => Ok(snapshot.envelope.into_outputs()),
            status => Err(EngineError::ExecutionFailed {
                status: status.as_str().to_string(),
                cause: snapshot.failure.map(|failure| failure.cause),
            }),
        }
    }
}
