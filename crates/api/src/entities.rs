//! HTTP-backed medical entity detection.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use visitnote_types::MedicalEntity;

use crate::capability::EntityExtractionCapability;
use crate::client::CapabilityClient;

const DETECT_PATH: &str = "/detect-entities";

#[derive(Debug, Clone)]
pub struct HttpEntityExtractionCapability {
    client: CapabilityClient,
}

impl HttpEntityExtractionCapability {
    pub fn new(client: CapabilityClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntityExtractionCapability for HttpEntityExtractionCapability {
    async fn detect_entities(&self, text: &str) -> Result<Vec<MedicalEntity>> {
        let payload = self
            .client
            .send_json(self.client.request(Method::POST, DETECT_PATH).json(&json!({ "Text": text })))
            .await?;
        decode_entities(payload)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEntity {
    text: String,
    category: String,
    r#type: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    begin_offset: Option<u64>,
    #[serde(default)]
    end_offset: Option<u64>,
}

/// Decode the `Entities` array, preserving the service's order.
pub fn decode_entities(payload: Value) -> Result<Vec<MedicalEntity>> {
    let entities = match payload {
        Value::Object(mut map) => map
            .remove("Entities")
            .ok_or_else(|| anyhow!("entity response is missing 'Entities'"))?,
        other => return Err(anyhow!("entity response must be an object, got {}", json_kind(&other))),
    };
    let raw: Vec<RawEntity> = serde_json::from_value(entities).context("decode entities")?;
    Ok(raw
        .into_iter()
        .map(|entity| MedicalEntity {
            text: entity.text,
            category: entity.category,
            entity_type: entity.r#type,
            score: entity.score,
            begin_offset: entity.begin_offset,
            end_offset: entity.end_offset,
        })
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
