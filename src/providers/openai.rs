//! OpenAI-compatible chat-completions backend
//!
//! Talks to `POST {base_url}/chat/completions` with bearer authentication.
//! Works against the hosted OpenAI API and any server exposing the same
//! request/response shape.

use crate::config::ApiConfig;
use crate::error::{Result, ParleyError};
use crate::providers::{BackendError, ChatMessage, ChatRequest, ChatResponse, CompletionBackend};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// HTTP backend for OpenAI-style chat completions
///
/// # Examples
///
/// ```
/// use parley::config::ApiConfig;
/// use parley::providers::OpenAiBackend;
///
/// let config = ApiConfig {
///     api_key: Some("sk-test".to_string()),
///     ..Default::default()
/// };
/// let backend = OpenAiBackend::new(&config);
/// assert!(backend.is_ok());
/// ```
pub struct OpenAiBackend {
    client: Client,
    endpoint: String,
    api_key: String,
}

/// Request body for `/chat/completions`
#[derive(Debug, Serialize)]
struct CompletionRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f64,
}

/// Response body from `/chat/completions`
#[derive(Debug, Deserialize)]
struct CompletionResponseBody {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u64>,
}

/// Error envelope returned by OpenAI-style APIs
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenAiBackend {
    /// Create a backend from API settings
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be
    /// built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ParleyError::Authentication("No API key configured".to_string()))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ParleyError::Http)
            .context("Failed to create HTTP client")?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        tracing::info!("Initialized chat-completions backend: endpoint={}", endpoint);

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// Full URL of the completions endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Map a non-success HTTP status to a retry class
fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            BackendError::Authentication(format!("{}: {}", status, detail))
        }
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited(format!("{}: {}", status, detail)),
        _ => BackendError::Api(format!("{}: {}", status, detail)),
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn chat_completion(
        &self,
        request: &ChatRequest,
    ) -> std::result::Result<ChatResponse, BackendError> {
        let body = CompletionRequestBody {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        tracing::debug!(
            "Sending completion request: model={}, {} messages, max_tokens={}, temperature={}",
            request.model,
            request.messages.len(),
            request.max_tokens,
            request.temperature
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Api(format!("Request timed out: {}", e))
                } else {
                    BackendError::Api(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::debug!("Completion endpoint returned {}: {}", status, error_text);
            return Err(classify_status(status, &error_text));
        }

        let parsed: CompletionResponseBody = response
            .json()
            .await
            .map_err(|e| BackendError::Unexpected(format!("Failed to parse response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content);

        Ok(ChatResponse {
            content,
            total_tokens: parsed.usage.and_then(|u| u.total_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_api_key() {
        let err = OpenAiBackend::new(&ApiConfig::default()).err().expect("should fail");
        assert!(matches!(
            err.downcast_ref::<ParleyError>(),
            Some(ParleyError::Authentication(_))
        ));
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let config = ApiConfig {
            base_url: "http://localhost:9000/v1/".to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let backend = OpenAiBackend::new(&config).unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:9000/v1/chat/completions");
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            BackendError::Authentication(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            BackendError::Authentication(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            BackendError::RateLimited(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, ""),
            BackendError::Api(_)
        ));
    }

    #[test]
    fn test_classify_status_extracts_error_message() {
        let body = r#"{"error":{"message":"Model overloaded","type":"server_error"}}"#;
        let err = classify_status(StatusCode::SERVICE_UNAVAILABLE, body);
        assert!(err.to_string().contains("Model overloaded"));
    }

    #[test]
    fn test_response_body_tolerates_missing_fields() {
        let parsed: CompletionResponseBody = serde_json::from_str(r#"{"choices":[{}]}"#).unwrap();
        assert!(parsed.choices[0].message.is_none());
        assert!(parsed.usage.is_none());
    }
}
