#![deny(warnings)]

//! OpenAI-compatible chat-completion client.
//!
//! Model output is treated as an untrusted wire format: callers always get
//! the raw text back and run their own schema/invariant validation. The
//! client itself only guarantees transport, retry on transient upstream
//! errors, and a non-empty `message.content`.

mod extract;

pub use extract::extract_json;

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Model used when `RUNIC_MODEL_ID` is not set.
pub const DEFAULT_MODEL_ID: &str = "gpt-4o-mini";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// HTTP status codes that indicate transient upstream errors (retryable).
const RETRYABLE_STATUS_CODES: &[u16] = &[502, 503, 504];

/// Maximum number of retry attempts for transient errors.
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds (doubles with each retry).
const INITIAL_BACKOFF_MS: u64 = 100;

/// Chat client failures.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OPENAI_API_KEY is not set in the environment")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response had no choices")]
    NoChoices,
    #[error("completion content was empty. Hint: {hint}")]
    EmptyContent { hint: String },
    #[error("completion response did not parse: {0}")]
    MalformedResponse(String),
}

/// A single completion request: one system message, a token budget, and
/// optionally the JSON-object response format.
#[derive(Debug)]
pub struct ChatRequest<'a> {
    pub system: &'a str,
    pub max_tokens: u32,
    pub json_object: bool,
}

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct Message {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refusal: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    pub model: String,
}

impl ChatClient {
    /// Build from `OPENAI_API_KEY` (required), `OPENAI_BASE_URL` and
    /// `RUNIC_MODEL_ID` (both optional).
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model =
            std::env::var("RUNIC_MODEL_ID").unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string());
        Ok(Self::new(base_url, api_key, model))
    }

    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        ChatClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    /// Run one completion and return the trimmed message content.
    ///
    /// Retries 502/503/504 with exponential backoff. An empty content field
    /// becomes `EmptyContent` with a hint built from the rest of the message
    /// so operators can debug refusals without digging through logs.
    pub async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "system", "content": request.system }],
            "max_completion_tokens": request.max_tokens,
        });
        if request.json_object {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let mut text = String::new();
        for attempt in 0..=MAX_RETRIES {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| LlmError::Transport(e.to_string()))?;

            let status = response.status().as_u16();
            text = response
                .text()
                .await
                .map_err(|e| LlmError::Transport(e.to_string()))?;

            if RETRYABLE_STATUS_CODES.contains(&status) && attempt < MAX_RETRIES {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    status,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    "transient completion error, backing off"
                );
                tokio::time::sleep(backoff).await;
                continue;
            }
            if status >= 400 {
                return Err(LlmError::Status { status, body: text });
            }
            break;
        }

        let completion: Completion =
            serde_json::from_str(&text).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
        let choice = completion.choices.into_iter().next().ok_or(LlmError::NoChoices)?;

        match choice.message.content.as_deref().map(str::trim) {
            Some(content) if !content.is_empty() => Ok(content.to_string()),
            _ => {
                let hint =
                    serde_json::to_string(&choice.message).unwrap_or_else(|_| "{}".to_string());
                Err(LlmError::EmptyContent { hint })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_parses_content() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"  hello  "}}]}"#;
        let c: Completion = serde_json::from_str(raw).unwrap();
        assert_eq!(
            c.choices[0].message.content.as_deref().map(str::trim),
            Some("hello")
        );
    }

    #[test]
    fn completion_tolerates_missing_fields() {
        let c: Completion = serde_json::from_str("{}").unwrap();
        assert!(c.choices.is_empty());
        let c: Completion =
            serde_json::from_str(r#"{"choices":[{"message":{"refusal":"no"}}]}"#).unwrap();
        assert_eq!(c.choices[0].message.content, None);
        assert_eq!(c.choices[0].message.refusal.as_deref(), Some("no"));
    }

    #[test]
    fn empty_content_error_carries_a_hint() {
        let message = Message {
            role: Some("assistant".into()),
            content: None,
            refusal: Some("I cannot".into()),
        };
        let hint = serde_json::to_string(&message).unwrap();
        assert!(hint.contains("refusal"));
    }

    #[tokio::test]
    #[ignore = "requires OPENAI_API_KEY"]
    async fn live_completion() {
        let client = ChatClient::from_env().unwrap();
        let out = client
            .complete(&ChatRequest {
                system: "Reply with the single word: pong",
                max_tokens: 10,
                json_object: false,
            })
            .await
            .unwrap();
        assert!(out.to_lowercase().contains("pong"));
    }
}
