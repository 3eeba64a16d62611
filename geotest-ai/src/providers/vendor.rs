//! Vendor request/response adapters
//!
//! Each vendor gets one tagged variant that knows its credential header,
//! request envelope and where the completion text lives in the response.

use serde_json::{json, Value};

use super::ProviderError;
use crate::types::{ProviderConfig, ProviderId};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const TEMPERATURE: f64 = 0.3;

/// Fully-built HTTP request for one provider call
#[derive(Debug, Clone, PartialEq)]
pub struct VendorRequest {
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// Request/response shape per vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorAdapter {
    /// OpenAI chat completions, bearer token
    OpenAiChat,
    /// Anthropic messages API, `x-api-key` header
    AnthropicMessages,
    /// Perplexity chat completions (OpenAI-compatible), bearer token
    PerplexityChat,
    /// Google Gemini generateContent, `x-goog-api-key` header
    GeminiGenerate,
}

impl VendorAdapter {
    pub fn for_provider(id: ProviderId) -> Self {
        match id {
            ProviderId::OpenAi => VendorAdapter::OpenAiChat,
            ProviderId::Anthropic => VendorAdapter::AnthropicMessages,
            ProviderId::Perplexity => VendorAdapter::PerplexityChat,
            ProviderId::Gemini => VendorAdapter::GeminiGenerate,
        }
    }

    /// Build the POST request for a system + user prompt pair
    pub fn build_request(
        &self,
        config: &ProviderConfig,
        api_key: &str,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> VendorRequest {
        match self {
            VendorAdapter::OpenAiChat => VendorRequest {
                endpoint: config.endpoint.clone(),
                headers: vec![bearer(api_key)],
                body: json!({
                    "model": config.model,
                    "messages": [
                        { "role": "system", "content": system_prompt },
                        { "role": "user", "content": user_prompt },
                    ],
                    "temperature": TEMPERATURE,
                    "max_tokens": max_tokens,
                    "response_format": { "type": "json_object" },
                }),
            },
            VendorAdapter::PerplexityChat => VendorRequest {
                endpoint: config.endpoint.clone(),
                headers: vec![bearer(api_key)],
                body: json!({
                    "model": config.model,
                    "messages": [
                        { "role": "system", "content": system_prompt },
                        { "role": "user", "content": user_prompt },
                    ],
                    "temperature": TEMPERATURE,
                    "max_tokens": max_tokens,
                }),
            },
            VendorAdapter::AnthropicMessages => VendorRequest {
                endpoint: config.endpoint.clone(),
                headers: vec![
                    ("x-api-key".to_string(), api_key.to_string()),
                    ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
                ],
                body: json!({
                    "model": config.model,
                    "max_tokens": max_tokens,
                    "temperature": TEMPERATURE,
                    "system": system_prompt,
                    "messages": [
                        { "role": "user", "content": user_prompt },
                    ],
                }),
            },
            VendorAdapter::GeminiGenerate => VendorRequest {
                endpoint: config.endpoint.clone(),
                headers: vec![("x-goog-api-key".to_string(), api_key.to_string())],
                body: json!({
                    "systemInstruction": { "parts": [ { "text": system_prompt } ] },
                    "contents": [
                        { "role": "user", "parts": [ { "text": user_prompt } ] },
                    ],
                    "generationConfig": {
                        "temperature": TEMPERATURE,
                        "maxOutputTokens": max_tokens,
                    },
                }),
            },
        }
    }

    /// Pull the completion text out of a vendor response envelope
    pub fn extract_text(&self, body: &Value) -> Result<String, ProviderError> {
        let text = match self {
            VendorAdapter::OpenAiChat | VendorAdapter::PerplexityChat => body
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .map(str::to_string),
            VendorAdapter::AnthropicMessages => body
                .get("content")
                .and_then(Value::as_array)
                .map(|blocks| join_text_parts(blocks, "text")),
            VendorAdapter::GeminiGenerate => body
                .pointer("/candidates/0/content/parts")
                .and_then(Value::as_array)
                .map(|parts| join_text_parts(parts, "text")),
        };

        match text {
            Some(t) if !t.trim().is_empty() => Ok(t),
            _ => Err(ProviderError::Malformed(format!(
                "{:?} response carries no completion text",
                self
            ))),
        }
    }
}

fn bearer(api_key: &str) -> (String, String) {
    ("Authorization".to_string(), format!("Bearer {}", api_key))
}

fn join_text_parts(parts: &[Value], field: &str) -> String {
    parts
        .iter()
        .filter_map(|p| p.get(field).and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}
