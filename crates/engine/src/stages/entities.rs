use std::sync::Arc;

use tracing::info;
use visitnote_api::EntityExtractionCapability;
use visitnote_types::{EnvelopeError, ResultEnvelope};

use crate::{EngineError, Stage};

/// Detects medical entities in the recorded summary.
#[derive(Clone)]
pub struct EntityExtractionStage {
    capability: Arc<dyn EntityExtractionCapability>,
}

impl EntityExtractionStage {
    pub fn new(capability: Arc<dyn EntityExtractionCapability>) -> Self {
        Self { capability }
    }

    pub async fn run(&self, envelope: &mut ResultEnvelope) -> Result<(), EngineError> {
        let summary = envelope.summary().ok_or(EnvelopeError::MissingPredecessor {
            block: "EntityExtractionOutput",
            requires: "SummarizationOutput",
        })?;
        let entities = self
            .capability
            .detect_entities(summary)
            .await
            .map_err(|error| EngineError::stage(Stage::EntityExtraction, error))?;
        info!(job_name = %envelope.input().job_name, entities = entities.len(), "medical entities detected");

        envelope.record_entities(entities)?;
        Ok(())
    }
}
