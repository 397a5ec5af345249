//! The visit-summary state machine.
//!
//! ```text
//! SubmitTranscription -> Wait -> CheckStatus -+-> Summarize -> ExtractEntities -> Succeed
//!                         ^                   |
//!                         +---- otherwise ----+-> Fail (FAILED)
//! ```
//!
//! One task drives one execution. Every state entry is recorded in the
//! [`ExecutionStore`] together with the latest envelope, and the whole run is
//! bounded by the configured execution timeout. Cancellation is observed at
//! every await point; stage errors fail the execution without retries.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use visitnote_types::{ExecutionHandle, ExecutionStatus, ResultEnvelope, TranscriptionJobStatus, WorkflowState};

use crate::{
    EngineError,
    poll::WaitController,
    settings::WorkflowSettings,
    stages::{EntityExtractionStage, StageServices, SummarizationStage, TranscriptionMode, TranscriptionStage},
    store::ExecutionStore,
};

/// State after a status check: `COMPLETED` summarizes, `FAILED` fails, anything else waits again.
pub fn next_after_status_check(status: &TranscriptionJobStatus) -> WorkflowState {
    match status {
        TranscriptionJobStatus::Completed => WorkflowState::Summarize,
        TranscriptionJobStatus::Failed => WorkflowState::Fail,
        _ => WorkflowState::Wait,
    }
}

/// Drives executions through the fixed state graph.
#[derive(Clone)]
pub struct StateMachine {
    transcription: TranscriptionStage,
    summarization: SummarizationStage,
    entities: EntityExtractionStage,
    settings: WorkflowSettings,
}

impl StateMachine {
    pub fn new(services: StageServices, settings: WorkflowSettings) -> Self {
        Self {
            transcription: TranscriptionStage::new(services.transcription),
            summarization: SummarizationStage::new(services.artifacts, services.summarization, settings.summary_max_tokens),
            entities: EntityExtractionStage::new(services.entities),
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Run one execution to a terminal status and record the outcome.
    ///
    /// The execution must already exist in `store`. Returns the status the
    /// store holds afterwards, which is `ABORTED` if the execution was stopped
    /// from outside while this task was still running.
    pub async fn run(
        &self,
        handle: ExecutionHandle,
        envelope: ResultEnvelope,
        store: &ExecutionStore,
        cancel: CancellationToken,
    ) -> ExecutionStatus {
        let mut envelope = envelope;
        let limit = self.settings.execution_timeout;
        info!(handle = %handle, job_name = %envelope.input().job_name, "execution started");

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            result = tokio::time::timeout(limit, self.drive(&handle, &mut envelope, store, &cancel)) => {
                result.unwrap_or(Err(EngineError::ExecutionTimeout { limit }))
            }
        };

        match outcome {
            Ok(()) => {
                store.finish(&handle, ExecutionStatus::Succeeded, None, Some(&envelope));
                info!(handle = %handle, "execution succeeded");
            }
            Err(EngineError::Cancelled) => {
                store.finish(&handle, ExecutionStatus::Aborted, Some(EngineError::Cancelled.to_failure()), None);
                info!(handle = %handle, "execution aborted");
            }
            Err(error) => {
                warn!(handle = %handle, error = %error, code = error.code(), "execution failed");
                store.finish(&handle, ExecutionStatus::Failed, Some(error.to_failure()), Some(&envelope));
            }
        }

        store
            .snapshot(&handle)
            .map(|snapshot| snapshot.status)
            .unwrap_or(ExecutionStatus::Aborted)
    }

    async fn drive(
        &self,
        handle: &ExecutionHandle,
        envelope: &mut ResultEnvelope,
        store: &ExecutionStore,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        let job_name = envelope.input().job_name.clone();
        let mut waiter = WaitController::new(self.settings.poll.clone());
        let mut state = WorkflowState::SubmitTranscription;

        while !state.is_terminal() {
            if cancel.is_cancelled() || !store.enter(handle, state) {
                return Err(EngineError::Cancelled);
            }
            debug!(handle = %handle, state = %state, "entered state");

            state = self.step(state, envelope, &mut waiter, &job_name, cancel).await?;
            store.record_envelope(handle, envelope);
        }

        match state {
            WorkflowState::Fail => Err(EngineError::TranscriptionJobFailed { job_name }),
            _ => Ok(()),
        }
    }

    /// Execute one non-terminal state and pick the next one.
    async fn step(
        &self,
        state: WorkflowState,
        envelope: &mut ResultEnvelope,
        waiter: &mut WaitController,
        job_name: &str,
        cancel: &CancellationToken,
    ) -> Result<WorkflowState, EngineError> {
        let next = match state {
            WorkflowState::SubmitTranscription => {
                self.transcription.run(TranscriptionMode::Submit, envelope).await?;
                WorkflowState::Wait
            }
            WorkflowState::Wait => {
                waiter.wait(job_name, cancel).await?;
                WorkflowState::CheckStatus
            }
            WorkflowState::CheckStatus => {
                let status = self.transcription.run(TranscriptionMode::Poll, envelope).await?;
                next_after_status_check(&status)
            }
            WorkflowState::Summarize => {
                self.summarization.run(envelope).await?;
                WorkflowState::ExtractEntities
            }
            WorkflowState::ExtractEntities => {
                self.entities.run(envelope).await?;
                WorkflowState::Succeed
            }
            terminal @ (WorkflowState::Succeed | WorkflowState::Fail) => terminal,
        };
        Ok(next)
    }
}
