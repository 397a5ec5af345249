//! Clients for the external capabilities behind the visit-summary pipeline.
//!
//! The pipeline treats transcription, summarization, entity extraction, and
//! transcript storage as opaque remote capabilities. This crate defines their
//! contracts ([`capability`]) and provides HTTP/filesystem implementations that
//! normalize each service's response at the boundary:
//!
//! - [`HttpTranscriptionCapability`]: submit and poll medical transcription jobs
//! - [`HttpSummarizationCapability`]: completion-style text model
//! - [`HttpEntityExtractionCapability`]: medical entity detection
//! - [`FsArtifactStore`] / [`HttpArtifactStore`]: transcript artifact reads
//! - [`GatewayClient`]: the visitnote front door itself
//!
//! Every client is built on [`CapabilityClient`], which validates its base URL
//! (HTTPS unless loopback) and decodes responses strictly.

pub mod artifacts;
pub mod capability;
pub mod client;
pub mod entities;
pub mod gateway;
pub mod summarization;
pub mod transcription;

pub use artifacts::{FsArtifactStore, HttpArtifactStore};
pub use capability::{
    ArtifactStore, EntityExtractionCapability, SummarizationCapability, TRANSCRIPTION_SPECIALTY, TRANSCRIPTION_TYPE,
    TranscriptionCapability, TranscriptionJob, TranscriptionSubmission,
};
pub use client::{CapabilityClient, DEFAULT_REQUEST_TIMEOUT, validate_base_url};
pub use entities::HttpEntityExtractionCapability;
pub use gateway::{GatewayClient, GatewayClientError};
pub use summarization::HttpSummarizationCapability;
pub use transcription::HttpTranscriptionCapability;
