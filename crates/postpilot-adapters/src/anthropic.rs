//! Shared Anthropic Messages API client
//!
//! Both the vision analyzer and the content generator speak to the same
//! endpoint; this module owns the wire structs and the single-turn call.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<MessageParam>,
}

#[derive(Debug, Serialize)]
pub struct MessageParam {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub url: String,
}

impl ImageSource {
    pub fn from_url(url: &str) -> Self {
        Self {
            source_type: "url".to_string(),
            url: url.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlockResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlockResponse {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Clone)]
pub struct AnthropicClient {
    http_client: reqwest::Client,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for Anthropic")?;
        Ok(Self {
            http_client,
            api_key,
        })
    }

    /// Send one user turn and return the first text block of the reply.
    pub async fn complete(&self, request: MessagesRequest) -> Result<String> {
        let response = self
            .http_client
            .post(format!("{API_BASE}/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .context("Anthropic messages request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Anthropic API returned {status}: {body}"));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .context("Failed to decode Anthropic messages response")?;
        body.content
            .into_iter()
            .find_map(|block| match block {
                ContentBlockResponse::Text { text } => Some(text),
                ContentBlockResponse::Other => None,
            })
            .ok_or_else(|| anyhow!("Anthropic response contained no text block"))
    }
}
