//! Post-content generation adapter

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::anthropic::{AnthropicClient, ContentBlock, MessageParam, MessagesRequest};

/// Confidence assigned when the model replies with usable prose but no
/// parseable JSON envelope.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Generated post copy plus the model's own confidence in it.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedPost {
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    FALLBACK_CONFIDENCE
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate post copy from a prompt describing the media group and the
    /// tenant's brand voice.
    async fn generate_post(&self, prompt: &str) -> Result<GeneratedPost>;
}

pub struct ClaudeGenerator {
    client: AnthropicClient,
    model: String,
}

impl ClaudeGenerator {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: AnthropicClient::new(api_key, timeout)?,
            model,
        })
    }

    /// Parse the model reply: strip code fences, try the JSON envelope, and
    /// fall back to treating the whole reply as post text at reduced
    /// confidence.
    fn parse_reply(reply: &str) -> GeneratedPost {
        let stripped = strip_code_fences(reply);
        match serde_json::from_str::<GeneratedPost>(stripped) {
            Ok(post) => post,
            Err(_) => GeneratedPost {
                title: None,
                text: stripped.to_string(),
                confidence: FALLBACK_CONFIDENCE,
            },
        }
    }
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[async_trait]
impl ContentGenerator for ClaudeGenerator {
    async fn generate_post(&self, prompt: &str) -> Result<GeneratedPost> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: 1024,
            messages: vec![MessageParam {
                role: "user".to_string(),
                content: vec![ContentBlock::Text {
                    text: prompt.to_string(),
                }],
            }],
        };
        let reply = self.client.complete(request).await?;
        Ok(Self::parse_reply(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_json_envelope() {
        let reply = r#"{"title": "Team day", "text": "What a week!", "confidence": 0.9}"#;
        let post = ClaudeGenerator::parse_reply(reply);
        assert_eq!(post.title.as_deref(), Some("Team day"));
        assert_eq!(post.text, "What a week!");
        assert_eq!(post.confidence, 0.9);
    }

    #[test]
    fn test_parse_reply_fenced_json() {
        let reply = "```json\n{\"text\": \"Hello\", \"confidence\": 0.8}\n```";
        let post = ClaudeGenerator::parse_reply(reply);
        assert_eq!(post.text, "Hello");
        assert_eq!(post.confidence, 0.8);
    }

    #[test]
    fn test_parse_reply_missing_confidence_defaults() {
        let reply = r#"{"text": "Hello"}"#;
        let post = ClaudeGenerator::parse_reply(reply);
        assert_eq!(post.confidence, FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_parse_reply_raw_text_fallback() {
        let reply = "Check out our amazing week at the office!";
        let post = ClaudeGenerator::parse_reply(reply);
        assert_eq!(post.text, reply);
        assert_eq!(post.confidence, FALLBACK_CONFIDENCE);
        assert!(post.title.is_none());
    }
}
