//! Shared data model for the visit-summary pipeline.
//!
//! These types are exchanged between the engine, the HTTP front door, and the
//! CLI. Serialized field names are part of the public wire contract.

pub mod envelope;
pub mod execution;
pub mod request;

pub use envelope::{
    EntityExtractionOutput, EnvelopeError, MedicalEntity, Outputs, ResultEnvelope, SummarizationOutput, TranscriptionJobStatus,
    TranscriptionOutput,
};
pub use execution::{
    ExecutionFailure, ExecutionHandle, ExecutionHistory, ExecutionSnapshot, ExecutionStatus, StateTransition, WorkflowState,
};
pub use request::{ErrorBody, JobRequest, Language, StartExecutionRequest, StartExecutionResponse, StopExecutionRequest};
