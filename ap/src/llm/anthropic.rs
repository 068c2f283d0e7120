//! Anthropic Claude API client implementation
//!
//! Implements the LlmClient trait for Anthropic's Messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Message, StopReason};
use crate::config::LlmConfig;

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Longest wait honored from a `retry-after` header
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30);

/// Delay before retry number `attempt` (1-based)
fn backoff(attempt: u32, error: &LlmError) -> Duration {
    match error {
        LlmError::RateLimited { retry_after } => (*retry_after).min(MAX_RATE_LIMIT_WAIT),
        _ => Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt.saturating_sub(1))),
    }
}

/// Anthropic Claude API client
pub struct AnthropicClient {
    model: String,
    /// None when the key variable is unset; every call then fails with MissingApiKey
    api_key: Option<String>,
    api_key_env: String,
    base_url: String,
    http: Client,
    timeout: Duration,
    max_tokens: u32,
}

impl AnthropicClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config. A
    /// missing key is not an error here; it surfaces on the first call so
    /// stage workers can fall back to deterministic output.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(provider = %config.provider, model = %config.model, "from_config: called");
        let api_key = config.api_key();
        if api_key.is_none() {
            warn!(env = %config.api_key_env, "from_config: API key not set, calls will fail");
        }

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            timeout,
            max_tokens: config.max_tokens,
        })
    }

    /// Build the request body for the Anthropic API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");
        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "system": request.system_prompt,
            "messages": convert_messages(&request.messages),
        })
    }

    /// Parse the Anthropic API response
    fn parse_response(&self, api_response: AnthropicResponse) -> CompletionResponse {
        debug!(?api_response.stop_reason, "parse_response: called");
        let text = api_response
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text),
                AnthropicContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        CompletionResponse {
            content: if text.is_empty() { None } else { Some(text) },
            stop_reason: StopReason::from_anthropic(api_response.stop_reason.as_deref().unwrap_or("end_turn")),
        }
    }

    fn send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::Network(e)
        }
    }

    /// One HTTP round trip, no retries
    async fn attempt(&self, url: &str, api_key: &str, body: &serde_json::Value) -> Result<CompletionResponse, LlmError> {
        let response = self
            .http
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            debug!(retry_after, "attempt: rate limited (429)");
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            debug!(%status, "attempt: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message: text });
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(self.parse_response(api_response))
    }
}

/// Convert internal Message types to Anthropic API format
fn convert_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    debug!(message_count = %messages.len(), "convert_messages: called");
    messages
        .iter()
        .map(|msg| {
            serde_json::json!({
                "role": msg.role,
                "content": msg.content,
            })
        })
        .collect()
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| LlmError::MissingApiKey(self.api_key_env.clone()))?;
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(&request);

        let mut attempt = 0;
        loop {
            match self.attempt(&url, &api_key, &body).await {
                Ok(response) => {
                    debug!(attempt, "complete: success");
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    let delay = backoff(attempt, &e);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "complete: retrying after transient error");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "complete: giving up");
                    return Err(e);
                }
            }
        }
    }
}

// Anthropic API response types

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: Option<&str>, max_tokens: u32) -> AnthropicClient {
        AnthropicClient {
            model: "claude-3-haiku-20240307".to_string(),
            api_key: api_key.map(str::to_string),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            http: Client::new(),
            timeout: Duration::from_secs(60),
            max_tokens,
        }
    }

    #[test]
    fn test_build_request_body_basic() {
        let client = client(Some("test-key"), 512);
        let request = CompletionRequest::single("You are helpful", "Hello", 256);

        let body = client.build_request_body(&request);

        assert_eq!(body["model"], "claude-3-haiku-20240307");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["system"], "You are helpful");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
    }

    #[test]
    fn test_max_tokens_capped() {
        let client = client(Some("test-key"), 1000);
        let request = CompletionRequest::single("Test", "hi", 5000);

        let body = client.build_request_body(&request);

        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_parse_response_joins_text_blocks() {
        let client = client(Some("test-key"), 512);
        let api_response: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "text", "text": "1. first"},
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "2. second"}
            ],
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 10, "output_tokens": 20}
        }))
        .unwrap();

        let response = client.parse_response(api_response);

        assert_eq!(response.content, Some("1. first\n2. second".to_string()));
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
    }

    #[tokio::test]
    async fn test_complete_without_key_fails_fast() {
        let client = client(None, 512);
        let result = client.complete(CompletionRequest::single("Test", "hi", 10)).await;
        assert!(matches!(result, Err(LlmError::MissingApiKey(env)) if env == "ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_backoff() {
        let server = LlmError::ApiError {
            status: 503,
            message: String::new(),
        };
        assert_eq!(backoff(1, &server), Duration::from_millis(1000));
        assert_eq!(backoff(3, &server), Duration::from_millis(4000));

        let short = LlmError::RateLimited {
            retry_after: Duration::from_secs(2),
        };
        assert_eq!(backoff(1, &short), Duration::from_secs(2));

        let long = LlmError::RateLimited {
            retry_after: Duration::from_secs(600),
        };
        assert_eq!(backoff(1, &long), MAX_RATE_LIMIT_WAIT);
    }

    #[tokio::test]
    async fn test_request_timeout_maps_to_timeout_error() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut client = client(Some("test-key"), 512);
        client.timeout = Duration::from_millis(100);
        client.http = Client::builder().timeout(client.timeout).build().unwrap();
        let url = format!("http://{}/v1/messages", addr);
        let body = client.build_request_body(&CompletionRequest::single("Test", "hi", 10));

        let err = client.attempt(&url, "test-key", &body).await.unwrap_err();

        assert!(matches!(err, LlmError::Timeout(after) if after == Duration::from_millis(100)));
        assert!(err.is_retryable());
    }
}
