// src/llm.rs

use crate::config::LlmSection;
use crate::error::{PipelineError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Handle to the chat-completion service. Built once at startup and shared
/// read-only across requests.
pub struct LlmClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl LlmClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Build a client from the `[llm]` config section, taking the API key
    /// from `LLM_API_KEY`. A missing key is a startup failure.
    pub fn from_env(llm: &LlmSection) -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY").map_err(|_| PipelineError::Config {
            message: "LLM_API_KEY env var is required".to_string(),
        })?;
        Self::new(
            &llm.base_url,
            &llm.model,
            &api_key,
            Duration::from_secs(llm.request_timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a single user-role prompt with deterministic sampling and return
    /// the raw text of the first choice. One call, no retries.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Api { status, body });
        }

        let chat_response: ChatResponse = response.json().await?;
        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| PipelineError::response_parse("empty response from LLM"))
    }
}

/// Strip markdown fences and a stray `json` language tag from a model reply.
///
/// Models add these despite instructions. Applying this to an already-clean
/// reply is a no-op.
pub fn strip_fences(content: &str) -> &str {
    let stripped = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    match stripped.strip_prefix("json") {
        Some(rest) => rest.trim_start(),
        None => stripped,
    }
}

/// Extract the outermost JSON object from a string that may contain
/// surrounding text (e.g. thinking tokens from qwen3).
pub fn extract_json_object(s: &str) -> Result<&str> {
    let start = s
        .find('{')
        .ok_or_else(|| PipelineError::response_parse("no '{' found in LLM response"))?;
    let end = s
        .rfind('}')
        .ok_or_else(|| PipelineError::response_parse("no '}' found in LLM response"))?;
    if end <= start {
        return Err(PipelineError::response_parse(
            "malformed JSON in LLM response",
        ));
    }
    Ok(&s[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn strips_plain_fence() {
        assert_eq!(strip_fences("```\n{}\n```"), "{}");
    }

    #[test]
    fn strips_bare_language_tag() {
        assert_eq!(strip_fences("json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn unfenced_content_is_untouched() {
        assert_eq!(strip_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn fenced_and_unfenced_parse_identically() {
        let body = r#"{"vendor": "Acme", "total_amount": 12.5}"#;
        let fenced = format!("```json\n{body}\n```");
        let a: serde_json::Value = serde_json::from_str(strip_fences(&fenced)).unwrap();
        let b: serde_json::Value = serde_json::from_str(strip_fences(body)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn stripping_is_idempotent() {
        let fenced = "```json\n{\"a\": 1}\n```";
        let once = strip_fences(fenced);
        assert_eq!(strip_fences(once), once);
    }

    #[test]
    fn json_object_extracted_from_surrounding_text() {
        let s = "Sure, here is the result: {\"a\": {\"b\": 2}} hope that helps";
        assert_eq!(extract_json_object(s).unwrap(), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn missing_braces_are_an_error() {
        assert!(extract_json_object("no json here").is_err());
        assert!(extract_json_object("").is_err());
        assert!(extract_json_object("} backwards {").is_err());
    }
}
