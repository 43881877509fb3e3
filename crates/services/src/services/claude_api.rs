//! Client for the hosted LLM completion endpoint (Anthropic Messages API).

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Error)]
pub enum ClaudeApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("missing api key: ANTHROPIC_API_KEY is not configured")]
    MissingApiKey,
}

impl ClaudeApiError {
    /// Transient failures worth another attempt.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ClaudeResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

impl ClaudeResponse {
    /// Concatenated text of all text blocks, `None` when there are none.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect();
        (!parts.is_empty()).then(|| parts.concat())
    }
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ClaudeApiClient {
    http: Client,
    api_key: SecretString,
    model: String,
}

impl ClaudeApiClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(api_key: SecretString, model: Option<String>) -> Result<Self, ClaudeApiError> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ClaudeApiError::MissingApiKey);
        }
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("recipe-share/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClaudeApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a conversation, retrying transient failures with backoff.
    pub async fn complete(
        &self,
        messages: &[Message],
        system: Option<&str>,
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<ClaudeResponse, ClaudeApiError> {
        let request = ClaudeRequest {
            model: &self.model,
            max_tokens,
            messages,
            system,
            temperature,
        };

        (|| async { self.send_request(&request).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_delay(Duration::from_secs(10))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &ClaudeApiError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "LLM call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }

    async fn send_request(
        &self,
        request: &ClaudeRequest<'_>,
    ) -> Result<ClaudeResponse, ClaudeApiError> {
        let res = self
            .http
            .post(CLAUDE_API_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<ClaudeResponse>()
                .await
                .map_err(|e| ClaudeApiError::Serde(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(ClaudeApiError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(ClaudeApiError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(ClaudeApiError::Http { status, body })
            }
        }
    }

    /// Multi-turn conversation; returns the assistant's reply text.
    pub async fn chat(
        &self,
        messages: &[Message],
        system: Option<&str>,
        max_tokens: u32,
    ) -> Result<String, ClaudeApiError> {
        self.complete(messages, system, max_tokens, Some(0.7))
            .await?
            .text()
            .ok_or_else(|| ClaudeApiError::Serde("no text content in response".to_string()))
    }

    /// Single prompt expecting a JSON document back.
    pub async fn ask_json<T: for<'de> Deserialize<'de>>(
        &self,
        prompt: &str,
        system: Option<&str>,
        max_tokens: u32,
    ) -> Result<T, ClaudeApiError> {
        let response = self
            .complete(&[Message::user(prompt)], system, max_tokens, Some(0.3))
            .await?
            .text()
            .ok_or_else(|| ClaudeApiError::Serde("no text content in response".to_string()))?;

        parse_json_reply(&response)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ClaudeApiError {
    if e.is_timeout() {
        ClaudeApiError::Timeout
    } else {
        ClaudeApiError::Transport(e.to_string())
    }
}

pub(crate) fn parse_json_reply<T: for<'de> Deserialize<'de>>(
    response: &str,
) -> Result<T, ClaudeApiError> {
    let json_str = extract_json(response);
    if json_str.is_empty() {
        tracing::error!(response = %response, "LLM returned no JSON");
        return Err(ClaudeApiError::Serde("empty response".to_string()));
    }

    serde_json::from_str(json_str).map_err(|e| {
        let preview: String = json_str.chars().take(500).collect();
        tracing::error!(
            json_error = %e,
            response_length = response.len(),
            extracted_json_preview = %preview,
            "Failed to parse JSON reply"
        );
        ClaudeApiError::Serde(format!("{e} (response preview: {preview})"))
    })
}

/// JSON payload of a reply that may wrap it in a fenced block or in prose.
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```") {
        let after_fence = start + 3;
        // skip the language tag, if any
        let content_start = text[after_fence..]
            .find('\n')
            .map(|i| after_fence + i + 1)
            .unwrap_or(after_fence);
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if !text.starts_with(['{', '[']) {
        if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
            if start < end {
                return &text[start..=end];
            }
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_plain() {
        let input = r#"{"key": "value"}"#;
        assert_eq!(extract_json(input), r#"{"key": "value"}"#);
    }

    #[test]
    fn extract_json_code_block() {
        let input = "Here's the JSON:\n```json\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json(input), r#"{"key": "value"}"#);
    }

    #[test]
    fn extract_json_generic_code_block() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json(input), r#"{"key": "value"}"#);
    }

    #[test]
    fn extract_json_from_prose() {
        let input = "Sure! {\"key\": {\"nested\": 1}} Hope that helps.";
        assert_eq!(extract_json(input), r#"{"key": {"nested": 1}}"#);
    }

    #[test]
    fn parse_reply_reports_bad_json() {
        #[derive(Debug, Deserialize)]
        struct Reply {
            #[allow(dead_code)]
            key: String,
        }
        let err = parse_json_reply::<Reply>("not json at all").unwrap_err();
        assert!(matches!(err, ClaudeApiError::Serde(_)));
        assert!(parse_json_reply::<Reply>("   ").is_err());
    }

    #[test]
    fn response_text_joins_text_blocks() {
        let response: ClaudeResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "model": "m",
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 1, "output_tokens": 2 },
            "content": [
                { "type": "text", "text": "Hello " },
                { "type": "thinking", "thinking": "..." },
                { "type": "text", "text": "chef" }
            ]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("Hello chef"));
    }

    #[test]
    fn retry_policy() {
        assert!(ClaudeApiError::RateLimited.should_retry());
        assert!(ClaudeApiError::Http { status: 503, body: String::new() }.should_retry());
        assert!(!ClaudeApiError::Http { status: 400, body: String::new() }.should_retry());
        assert!(!ClaudeApiError::InvalidApiKey.should_retry());
    }

    #[test]
    fn blank_key_is_rejected() {
        let err = ClaudeApiClient::new(SecretString::from("  ".to_string()), None).unwrap_err();
        assert!(matches!(err, ClaudeApiError::MissingApiKey));
    }
}
