//! Vision analysis adapter

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::anthropic::{
    AnthropicClient, ContentBlock, ImageSource, MessageParam, MessagesRequest,
};

const ANALYSIS_PROMPT: &str = "\
Analyze this image for a social media content pipeline. Respond with a JSON \
object containing exactly these keys:
- description: one or two sentences describing the image
- topics: an array of 3-5 short topic keywords
- mood: a single mood label (e.g. celebratory, calm, energetic)
- objects: an array of notable objects or people visible
- context: a short label for the setting or occasion

Respond with only the JSON object.";

/// Black-box vision analysis: given a hosted image URL, return the model's
/// raw text reply. Parsing the embedded JSON is the caller's concern.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze_image(&self, image_url: &str) -> Result<String>;
}

pub struct ClaudeVision {
    client: AnthropicClient,
    model: String,
}

impl ClaudeVision {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: AnthropicClient::new(api_key, timeout)?,
            model,
        })
    }
}

#[async_trait]
impl VisionAnalyzer for ClaudeVision {
    async fn analyze_image(&self, image_url: &str) -> Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: 1024,
            messages: vec![MessageParam {
                role: "user".to_string(),
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource::from_url(image_url),
                    },
                    ContentBlock::Text {
                        text: ANALYSIS_PROMPT.to_string(),
                    },
                ],
            }],
        };
        self.client.complete(request).await
    }
}
