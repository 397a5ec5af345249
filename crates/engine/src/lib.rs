//! # Visitnote Engine
//!
//! Orchestrates the patient-visit summary pipeline: a recorded conversation is
//! transcribed, the transcript is summarized, and medical entities are
//! detected in the summary. Each run is an execution of a small state machine
//! whose results accumulate in a write-once [`ResultEnvelope`].
//!
//! ## Key Features
//!
//! - **Gateway**: validates job requests and launches executions without waiting
//! - **Stage clients**: one per capability, each writing exactly one output block
//! - **Wait controller**: fixed-interval polling with a ceiling and optional backoff
//! - **State machine**: fixed state graph, overall timeout, cooperative cancellation
//! - **Observer**: polls an execution until terminal and returns its outputs
//!
//! ## Usage
//!
//! ```rust
//! use visitnote_engine::job_request_from_wire;
//! use visitnote_types::StartExecutionRequest;
//!
//! let request = job_request_from_wire(StartExecutionRequest {
//!     job_name: Some("visit-1".into()),
//!     job_uri: Some("s3://recordings/visit-1.mp3".into()),
//!     output_location: Some("recordings".into()),
//!     output_prefix: Some("audio_transcripts".into()),
//!     language: Some("English".into()),
//! })?;
//! assert_eq!(request.transcript_key(), "audio_transcripts/medical/visit-1.json");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`stages`**: transcription, summarization and entity extraction clients
//! - **`poll`**: the wait controller and its policy
//! - **`machine`**: the state machine driving one execution
//! - **`store`**: execution records and transition histories
//! - **`launcher`**: local and remote execution hosts
//! - **`gateway`** / **`observer`**: the two ends callers use
//!
//! [`ResultEnvelope`]: visitnote_types::ResultEnvelope

pub mod error;
pub mod gateway;
pub mod launcher;
pub mod machine;
pub mod observer;
pub mod poll;
pub mod settings;
pub mod stages;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{EngineError, Stage, TRANSCRIPTION_FAILED_CAUSE};
pub use gateway::{ExecutionGateway, job_request_from_wire};
pub use launcher::{ExecutionLauncher, ExecutionStatusSource, LocalExecutor};
pub use machine::{StateMachine, next_after_status_check};
pub use observer::{DEFAULT_OBSERVER_INTERVAL, ExecutionObserver};
pub use poll::{PollPolicy, WaitController, parse_interval};
pub use settings::WorkflowSettings;
pub use stages::{EntityExtractionStage, StageServices, SummarizationStage, TranscriptionMode, TranscriptionStage};
pub use store::{DEFAULT_MAX_RETAINED_EXECUTIONS, ExecutionStore};
