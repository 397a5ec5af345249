//! Stage clients: the only code that talks to external capabilities.
//!
//! Each stage reads what it needs from the [`ResultEnvelope`], calls its
//! capability, normalizes the response and writes exactly one output block.
//! Remote errors are never swallowed; they surface as
//! [`EngineError::StageInvocationFailed`] and fail the execution.
//!
//! [`ResultEnvelope`]: visitnote_types::ResultEnvelope
//! [`EngineError::StageInvocationFailed`]: crate::EngineError::StageInvocationFailed

mod entities;
mod summarization;
mod transcription;

use std::sync::Arc;

use visitnote_api::{ArtifactStore, EntityExtractionCapability, SummarizationCapability, TranscriptionCapability};

pub use entities::EntityExtractionStage;
pub use summarization::{SummarizationStage, build_summary_prompt, extract_transcript};
pub use transcription::{TranscriptionMode, TranscriptionStage};

/// The capabilities one engine instance drives.
#[derive(Clone)]
pub struct StageServices {
    pub transcription: Arc<dyn TranscriptionCapability>,
    pub summarization: Arc<dyn SummarizationCapability>,
    pub entities: Arc<dyn EntityExtractionCapability>,
    pub artifacts: Arc<dyn ArtifactStore>,
}
