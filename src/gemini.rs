use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use reqwest::Client;
use tracing::{debug, info, error};

use crate::config::Config;
use crate::models::EncodedImagePart;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("API error: status={status} body={body}")] Api { status: u16, body: String },
    #[error("Other: {0}")] Other(String),
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable(value: &serde_json::Value) -> String {
    let mut value = value.clone();
    truncate_base64_in_json(&mut value);
    serde_json::to_string_pretty(&value).unwrap_or_default()
}

/// Short preview of a potentially huge string for log lines.
pub fn preview(data: &str) -> String {
    match data.char_indices().nth(50) {
        Some((idx, _)) => format!("{}...[{} chars total]", &data[..idx], data.chars().count()),
        None => data.to_string(),
    }
}

// --- Request / Response Types ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: EncodedImagePart,
    },
    Text { text: String },
    Other(serde_json::Value),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn image(image: &EncodedImagePart) -> Self {
        Part::Inline { inline_data: image.clone() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Image,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: Option<String>,
    pub response_schema: Option<serde_json::Value>,
    pub response_modalities: Option<Vec<Modality>>,
}

/// A single-turn `generateContent` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRequest {
    pub model: String,
    pub parts: Vec<Part>,
    pub generation_config: Option<GenerationConfig>,
}

impl ContentRequest {
    pub fn body(&self) -> serde_json::Value {
        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": self.parts
            }]
        });
        if let Some(config) = &self.generation_config {
            body["generationConfig"] = json!(config);
        }
        body
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Candidate { #[serde(default)] pub content: Content }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content { #[serde(default)] pub parts: Vec<Part> }

impl GeminiResponse {
    /// Concatenated text of the first candidate, if it has any.
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let texts: Vec<&str> = candidate
            .content
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if texts.is_empty() { None } else { Some(texts.concat()) }
    }

    /// Inline image carried by the first content part of the first candidate.
    pub fn first_part_image(&self) -> Option<&EncodedImagePart> {
        match self.candidates.first()?.content.parts.first()? {
            Part::Inline { inline_data } => Some(inline_data),
            _ => None,
        }
    }
}

/// The generative service the studio talks to.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate_content(&self, request: ContentRequest) -> Result<GeminiResponse, GeminiError>;
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

const API_KEY_HEADER: &str = "x-goog-api-key";

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GeminiError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.api_base.clone(),
        })
    }

    /// The key travels in a header, never in the URL, so transport errors
    /// and request logs cannot carry it.
    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate_content(&self, request: ContentRequest) -> Result<GeminiResponse, GeminiError> {
        let url = self.endpoint(&request.model);

        info!("🔗 Making request to: {}", url);

        let request_body = request.body();
        debug!("📤 Request body: {}", loggable(&request_body));

        let response = self.client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.without_url().to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(GeminiError::Api { status: status.as_u16(), body: error_body });
        }

        let response_text = response.text().await
            .map_err(|e| GeminiError::Http(e.without_url().to_string()))?;

        let parsed: serde_json::Value = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Other(format!("parse error: {}: {}", e, preview(&response_text))))?;
        debug!("📥 Raw Gemini API response: {}", loggable(&parsed));

        serde_json::from_value(parsed)
            .map_err(|e| GeminiError::Other(format!("unexpected response shape: {}", e)))
    }
}
