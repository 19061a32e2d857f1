//! Language model interface and transports
//!
//! The router, planner, reflector, and replanner all talk to an LLM
//! through the `LanguageModel` trait. The production transport is a
//! Gemini-compatible HTTP client with a long-lived pooled connection;
//! `ScriptedLanguageModel` keeps the system functional without one.

use crate::config::LlmConfig;
use crate::error::AgentError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Prompt-in, text-out model interface
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> crate::Result<String>;
}

/// Extract the JSON payload from an LLM reply.
///
/// A markdown code fence (optionally tagged `json`) is tried first; when
/// no fence is present the raw text is treated as the payload directly.
pub fn extract_json_payload(raw: &str) -> &str {
    if let Some(start) = raw.find("```") {
        let after = &raw[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    raw.trim()
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait::async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(AgentError::LlmError(
                "LLM_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 2048,
            },
        };

        info!("Calling LLM API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("LLM API request failed: {}", e);
                AgentError::LlmError(format!("LLM API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("LLM API error response: {}", error_text);
            return Err(AgentError::LlmError(format!(
                "LLM API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse LLM response: {}", e);
            AgentError::LlmError(format!("LLM parse error: {}", e))
        })?;

        let answer = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| AgentError::LlmError("Empty response from LLM".to_string()))?;

        Ok(answer)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

// The Gemini REST API expects camelCase keys.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

/// Queue-backed model for development and testing: each `generate` call
/// pops the next canned reply. An exhausted queue behaves like a model
/// outage, which exercises every caller's failure path.
pub struct ScriptedLanguageModel {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedLanguageModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait::async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn generate(&self, _prompt: &str) -> crate::Result<String> {
        let mut responses = self.responses.lock().await;
        responses
            .pop_front()
            .ok_or_else(|| AgentError::LlmError("scripted model exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_tagged_fence() {
        let raw = "Here you go:\n```json\n{\"a\": 1}\n```\nthanks";
        assert_eq!(extract_json_payload(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_from_untagged_fence() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_payload(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_without_fence_returns_raw() {
        let raw = "  {\"a\": 1}  ";
        assert_eq!(extract_json_payload(raw), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn test_scripted_model_pops_in_order() {
        let model = ScriptedLanguageModel::new(["one", "two"]);
        assert_eq!(model.generate("x").await.unwrap(), "one");
        assert_eq!(model.generate("x").await.unwrap(), "two");
        assert!(model.generate("x").await.is_err());
    }

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "What are the key risks?".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 2048,
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("What are the key risks?"));

        // Wire format uses the API's camelCase keys, not field names.
        assert!(json.contains("\"generationConfig\""));
        assert!(json.contains("\"maxOutputTokens\""));
        assert!(json.contains("\"topP\""));
        assert!(!json.contains("generation_config"));
    }
}
