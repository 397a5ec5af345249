//! HTTP-backed summarization capability.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::debug;

use crate::capability::SummarizationCapability;
use crate::client::CapabilityClient;

const INVOKE_PATH: &str = "/invoke";

/// Calls a completion-style text model.
///
/// The prompt is framed as a single human turn and the model's `completion`
/// field is returned as-is.
#[derive(Debug, Clone)]
pub struct HttpSummarizationCapability {
    client: CapabilityClient,
    model_id: String,
}

impl HttpSummarizationCapability {
    pub fn new(client: CapabilityClient, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
        }
    }
}

/// Wrap prompt text in the human/assistant framing the model expects.
pub fn frame_prompt(prompt_text: &str) -> String {
    format!("\n\nHuman: {prompt_text}\n\nAssistant:")
}

#[async_trait]
impl SummarizationCapability for HttpSummarizationCapability {
    async fn summarize(&self, prompt_text: &str, max_tokens: u32) -> Result<String> {
        debug!(model_id = %self.model_id, max_tokens, "invoking summarization model");
        let body = json!({
            "modelId": self.model_id,
            "prompt": frame_prompt(prompt_text),
            "max_tokens_to_sample": max_tokens,
        });
        let payload = self
            .client
            .send_json(self.client.request(Method::POST, INVOKE_PATH).json(&body))
            .await?;
        payload
            .get("completion")
            .and_then(|completion| completion.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("summarization response is missing a string 'completion' field"))
    }
}
