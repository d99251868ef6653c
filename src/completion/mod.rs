//! Completion client
//!
//! Turns a user message plus request settings into a [`CompletionResult`].
//! Each call validates its input, resolves the model against the
//! capability table, clamps the request settings, and then drives the
//! backend through a bounded retry loop:
//!
//! ```text
//! Validating -> Failed
//! Validating -> Attempting(n) -> Success
//!                             -> Retrying -> Attempting(n + 1)
//!                             -> Failed
//! ```
//!
//! Expected failures never surface as `Err`; they resolve to
//! [`CompletionResult::Failure`] with a human-readable description.

pub mod catalog;

use crate::config::{Config, UnknownModelPolicy};
use crate::providers::{BackendError, ChatMessage, ChatRequest, CompletionBackend};
use catalog::{ModelCatalog, ModelSpec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Message sent by [`CompletionClient::test_connection`]
pub const CONNECTION_TEST_MESSAGE: &str = "Hello! This is a connection test.";

const MIN_TEMPERATURE: f64 = 0.0;
const MAX_TEMPERATURE: f64 = 2.0;

/// Outcome of one `complete` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionResult {
    /// The remote side produced a non-empty response
    Success {
        /// Response text
        response: String,
        /// Model that served the request (after fallback)
        model_used: String,
        /// Total tokens, when reported by the remote side
        tokens_used: Option<u64>,
        /// Locally estimated cost in dollars
        estimated_cost: f64,
        /// Seconds from the first attempt to the result
        response_time: f64,
    },
    /// Validation, transport or API failure
    Failure {
        /// Human-readable description
        error: String,
        /// Seconds spent before giving up (0 for validation failures)
        response_time: f64,
    },
}

impl CompletionResult {
    fn failure(error: impl Into<String>, response_time: f64) -> Self {
        Self::Failure {
            error: error.into(),
            response_time,
        }
    }

    /// Whether the call succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Response text on success
    pub fn response(&self) -> Option<&str> {
        match self {
            Self::Success { response, .. } => Some(response),
            Self::Failure { .. } => None,
        }
    }

    /// Error description on failure
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    /// Elapsed seconds, always non-negative
    pub fn response_time(&self) -> f64 {
        match self {
            Self::Success { response_time, .. } | Self::Failure { response_time, .. } => {
                *response_time
            }
        }
    }
}

/// Attempt budget and backoff schedule for remote calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub max_attempts: u32,
    /// Base wait after a generic API error
    pub api_error_backoff: Duration,
    /// Base wait after a rate-limit response
    pub rate_limit_backoff: Duration,
    /// Base wait after an unclassified failure or empty response
    pub unexpected_backoff: Duration,
    /// Treat an empty response as transient
    pub retry_empty_response: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            api_error_backoff: Duration::from_secs(1),
            rate_limit_backoff: Duration::from_secs(2),
            unexpected_backoff: Duration::from_secs(1),
            retry_empty_response: false,
        }
    }
}

impl RetryPolicy {
    /// Policy described by API settings
    pub fn from_config(api: &crate::config::ApiConfig) -> Self {
        Self {
            max_attempts: api.max_retries.max(1),
            api_error_backoff: Duration::from_millis(api.api_error_backoff_ms),
            rate_limit_backoff: Duration::from_millis(api.rate_limit_backoff_ms),
            unexpected_backoff: Duration::from_millis(api.unexpected_error_backoff_ms),
            retry_empty_response: api.retry_empty_response,
        }
    }

    /// `max_attempts` attempts with no waiting in between
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            api_error_backoff: Duration::ZERO,
            rate_limit_backoff: Duration::ZERO,
            unexpected_backoff: Duration::ZERO,
            retry_empty_response: false,
        }
    }

    /// Wait before the attempt following failed attempt number `attempt` (1-based)
    pub fn backoff_for(&self, error: &BackendError, attempt: u32) -> Duration {
        let base = match error {
            BackendError::RateLimited(_) => self.rate_limit_backoff,
            BackendError::Api(_) => self.api_error_backoff,
            BackendError::Unexpected(_) | BackendError::Authentication(_) => {
                self.unexpected_backoff
            }
        };
        base * attempt.max(1)
    }
}

/// Clamp a temperature into [0.0, 2.0]; NaN becomes `fallback`
pub fn clamp_temperature(temperature: f64, fallback: f64) -> f64 {
    let value = if temperature.is_nan() {
        fallback
    } else {
        temperature
    };
    value.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
}

/// Ordered prompt: optional non-blank system turn, then the user turn
pub fn build_prompt(message: &str, system_prompt: Option<&str>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt.filter(|s| !s.trim().is_empty()) {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(message));
    messages
}

fn describe_failure(error: &BackendError) -> String {
    match error {
        BackendError::Authentication(_) => {
            "Invalid API key. Please check your configuration.".to_string()
        }
        BackendError::RateLimited(_) => "Rate limit exceeded. Please try again later.".to_string(),
        BackendError::Api(e) => format!("API Error: {}", e),
        BackendError::Unexpected(e) => format!("Unexpected error: {}", e),
    }
}

/// Stateless client around a [`CompletionBackend`]
pub struct CompletionClient {
    backend: Arc<dyn CompletionBackend>,
    catalog: ModelCatalog,
    policy: RetryPolicy,
    max_message_length: usize,
    timeout: Duration,
    unknown_model: UnknownModelPolicy,
    default_temperature: f64,
}

impl CompletionClient {
    /// Create a client with default limits (4000 chars, 30s timeout, fallback policy)
    pub fn new(backend: Arc<dyn CompletionBackend>, catalog: ModelCatalog, policy: RetryPolicy) -> Self {
        Self {
            backend,
            catalog,
            policy,
            max_message_length: 4000,
            timeout: Duration::from_secs(30),
            unknown_model: UnknownModelPolicy::Fallback,
            default_temperature: 0.7,
        }
    }

    /// Create a client wired from configuration
    pub fn from_config(config: &Config, backend: Arc<dyn CompletionBackend>) -> Self {
        Self::new(
            backend,
            ModelCatalog::from_config(config),
            RetryPolicy::from_config(&config.api),
        )
        .with_max_message_length(config.chat.max_message_length)
        .with_timeout(config.api.timeout())
        .with_unknown_model_policy(config.chat.unknown_model)
        .with_default_temperature(config.chat.temperature)
    }

    /// Longest accepted message, in characters
    pub fn with_max_message_length(mut self, max: usize) -> Self {
        self.max_message_length = max;
        self
    }

    /// Per-attempt timeout passed to the backend
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Handling of model ids missing from the catalog
    pub fn with_unknown_model_policy(mut self, policy: UnknownModelPolicy) -> Self {
        self.unknown_model = policy;
        self
    }

    /// Temperature used when a caller passes NaN
    pub fn with_default_temperature(mut self, temperature: f64) -> Self {
        self.default_temperature = temperature;
        self
    }

    /// The capability table this client resolves models against
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Known models and their metadata
    pub fn available_models(&self) -> &[ModelSpec] {
        self.catalog.available_models()
    }

    /// Pre-flight cost estimate for `message` on `model`
    pub fn estimate_cost(&self, message: &str, model: &str) -> f64 {
        self.catalog.estimate_cost(message, model)
    }

    /// Send a trivial message to verify connectivity and credentials
    pub async fn test_connection(&self, model: &str) -> CompletionResult {
        self.complete(
            CONNECTION_TEST_MESSAGE,
            model,
            self.default_temperature,
            64,
            None,
        )
        .await
    }

    /// Request a completion for `message`
    ///
    /// Validation failures return immediately with a response time of 0.
    /// Authentication failures are never retried; every other remote
    /// failure is retried until the attempt budget is spent.
    pub async fn complete(
        &self,
        message: &str,
        model: &str,
        temperature: f64,
        max_tokens: u32,
        system_prompt: Option<&str>,
    ) -> CompletionResult {
        if message.trim().is_empty() {
            return CompletionResult::failure("Empty message provided", 0.0);
        }

        if message.chars().count() > self.max_message_length {
            return CompletionResult::failure(
                format!(
                    "Message too long. Maximum {} characters allowed.",
                    self.max_message_length
                ),
                0.0,
            );
        }

        let spec = match self.resolve_model(model) {
            Ok(spec) => spec,
            Err(error) => return CompletionResult::failure(error, 0.0),
        };

        let request = ChatRequest {
            model: spec.id.clone(),
            messages: build_prompt(message, system_prompt),
            max_tokens: max_tokens.min(spec.max_tokens).max(1),
            temperature: clamp_temperature(temperature, self.default_temperature),
            timeout: self.timeout,
        };

        let started = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let attempt_started = Instant::now();
            let outcome = self.backend.chat_completion(&request).await;
            tracing::debug!(
                "Attempt {}/{} finished in {:.3}s",
                attempt,
                max_attempts,
                attempt_started.elapsed().as_secs_f64()
            );

            match outcome {
                Ok(response) => {
                    let text = response.content.filter(|c| !c.trim().is_empty());
                    if let Some(text) = text {
                        let response_time = started.elapsed().as_secs_f64();
                        tracing::info!(
                            "Completion succeeded: model={}, attempt={}, {:.2}s",
                            spec.id,
                            attempt,
                            response_time
                        );
                        return CompletionResult::Success {
                            response: text,
                            model_used: spec.id.clone(),
                            tokens_used: response.total_tokens,
                            estimated_cost: self.catalog.estimate_cost(message, &spec.id),
                            response_time,
                        };
                    }

                    if self.policy.retry_empty_response && attempt < max_attempts {
                        tracing::warn!("Empty response (attempt {}), retrying", attempt);
                        tokio::time::sleep(self.policy.unexpected_backoff * attempt).await;
                        continue;
                    }

                    tracing::error!("Empty response from API (attempt {})", attempt);
                    return CompletionResult::failure(
                        "Empty response from API",
                        started.elapsed().as_secs_f64(),
                    );
                }
                Err(error) if !error.is_transient() => {
                    tracing::error!("Authentication failed: {}", error);
                    return CompletionResult::failure(
                        describe_failure(&error),
                        started.elapsed().as_secs_f64(),
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        "Completion attempt {}/{} failed: {}",
                        attempt,
                        max_attempts,
                        error
                    );
                    if attempt == max_attempts {
                        tracing::error!("Giving up after {} attempts", max_attempts);
                        return CompletionResult::failure(
                            describe_failure(&error),
                            started.elapsed().as_secs_f64(),
                        );
                    }
                    tokio::time::sleep(self.policy.backoff_for(&error, attempt)).await;
                }
            }
        }

        CompletionResult::failure("No attempts were made", started.elapsed().as_secs_f64())
    }

    fn resolve_model(&self, model: &str) -> std::result::Result<&ModelSpec, String> {
        if let Some(spec) = self.catalog.get(model) {
            return Ok(spec);
        }

        match self.unknown_model {
            UnknownModelPolicy::Reject => Err(format!("Unknown model: {}", model)),
            UnknownModelPolicy::Fallback => {
                let fallback = self.catalog.default_spec().ok_or_else(|| {
                    format!(
                        "Unknown model {} and default model {} is not configured",
                        model,
                        self.catalog.default_model()
                    )
                })?;
                tracing::warn!(
                    "Unknown model {}, falling back to {}",
                    model,
                    fallback.id
                );
                Ok(fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::fake::ScriptedBackend;
    use crate::providers::ChatResponse;
    use crate::storage::Role;

    fn ok(content: &str) -> std::result::Result<ChatResponse, BackendError> {
        Ok(ChatResponse {
            content: Some(content.to_string()),
            total_tokens: Some(12),
        })
    }

    fn client_with(backend: Arc<ScriptedBackend>, attempts: u32) -> CompletionClient {
        CompletionClient::new(backend, ModelCatalog::builtin(), RetryPolicy::immediate(attempts))
    }

    #[tokio::test]
    async fn test_success_populates_result() {
        let backend = Arc::new(ScriptedBackend::new(vec![ok("Hello there")]));
        let client = client_with(backend.clone(), 3);

        let result = client.complete("abcd", "gpt-4", 0.7, 500, None).await;

        match result {
            CompletionResult::Success {
                response,
                model_used,
                tokens_used,
                estimated_cost,
                response_time,
            } => {
                assert_eq!(response, "Hello there");
                assert_eq!(model_used, "gpt-4");
                assert_eq!(tokens_used, Some(12));
                assert!((estimated_cost - 0.03 / 1000.0).abs() < 1e-12);
                assert!(response_time >= 0.0);
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_message_fails_without_call() {
        let backend = Arc::new(ScriptedBackend::replying("unused"));
        let client = client_with(backend.clone(), 3);

        let result = client.complete("   \n", "gpt-4", 0.7, 100, None).await;
        assert_eq!(result.error(), Some("Empty message provided"));
        assert_eq!(result.response_time(), 0.0);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_over_length_message_fails_without_call() {
        let backend = Arc::new(ScriptedBackend::replying("unused"));
        let client = client_with(backend.clone(), 3).with_max_message_length(10);

        let result = client.complete("01234567890", "gpt-4", 0.7, 100, None).await;
        assert_eq!(
            result.error(),
            Some("Message too long. Maximum 10 characters allowed.")
        );
        assert_eq!(result.response_time(), 0.0);
        assert_eq!(backend.call_count(), 0);

        // Exactly at the limit is accepted.
        let result = client.complete("0123456789", "gpt-4", 0.7, 100, None).await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_temperature_is_clamped() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let client = client_with(backend.clone(), 1);

        client.complete("hi", "gpt-4", 5.0, 100, None).await;
        client.complete("hi", "gpt-4", 2.0, 100, None).await;
        client.complete("hi", "gpt-4", -1.0, 100, None).await;

        let temps: Vec<f64> = backend.requests().iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![2.0, 2.0, 0.0]);
    }

    #[tokio::test]
    async fn test_max_tokens_clamped_to_model_ceiling() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let client = client_with(backend.clone(), 1);

        client.complete("hi", "gpt-3.5-turbo", 0.7, 100_000, None).await;
        client.complete("hi", "gpt-3.5-turbo", 0.7, 0, None).await;

        let limits: Vec<u32> = backend.requests().iter().map(|r| r.max_tokens).collect();
        assert_eq!(limits, vec![4096, 1]);
    }

    #[tokio::test]
    async fn test_zero_ceiling_model_still_requests_one_token() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let catalog = ModelCatalog::new(vec![ModelSpec::new("tiny", "Tiny", 0.0, 0)], "tiny");
        let client = CompletionClient::new(backend.clone(), catalog, RetryPolicy::immediate(1));

        let result = client.complete("hi", "tiny", 0.7, 100, None).await;

        assert!(result.is_success());
        assert_eq!(backend.requests()[0].max_tokens, 1);
    }

    #[tokio::test]
    async fn test_unknown_model_falls_back_to_default() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let client = client_with(backend.clone(), 1);

        let result = client.complete("hi", "gpt-99", 0.7, 100, None).await;
        match result {
            CompletionResult::Success { model_used, .. } => assert_eq!(model_used, "gpt-3.5-turbo"),
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(backend.requests()[0].model, "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_unknown_model_rejected_when_configured() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let client =
            client_with(backend.clone(), 1).with_unknown_model_policy(UnknownModelPolicy::Reject);

        let result = client.complete("hi", "gpt-99", 0.7, 100, None).await;
        assert_eq!(result.error(), Some("Unknown model: gpt-99"));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_system_prompt_precedes_user_turn() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let client = client_with(backend.clone(), 1);

        client
            .complete("question", "gpt-4", 0.7, 100, Some("Be brief."))
            .await;
        client.complete("question", "gpt-4", 0.7, 100, Some("  ")).await;

        let requests = backend.requests();
        let roles: Vec<Role> = requests[0].messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
        assert_eq!(requests[0].messages[0].content, "Be brief.");
        assert_eq!(requests[1].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_authentication_failure_is_not_retried() {
        let backend = Arc::new(ScriptedBackend::repeating(Err(
            BackendError::Authentication("401".into()),
        )));
        let client = client_with(backend.clone(), 3);

        let result = client.complete("hi", "gpt-4", 0.7, 100, None).await;
        assert_eq!(
            result.error(),
            Some("Invalid API key. Please check your configuration.")
        );
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_exhausts_budget() {
        let backend = Arc::new(ScriptedBackend::repeating(Err(BackendError::Api(
            "500 Internal Server Error".into(),
        ))));
        let client = client_with(backend.clone(), 3);

        let result = client.complete("hi", "gpt-4", 0.7, 100, None).await;
        assert_eq!(
            result.error(),
            Some("API Error: 500 Internal Server Error")
        );
        assert_eq!(backend.call_count(), 3);
        assert!(result.response_time() >= 0.0);
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(BackendError::RateLimited("429".into())),
            Err(BackendError::Unexpected("decode".into())),
            ok("third time lucky"),
        ]));
        let client = client_with(backend.clone(), 3);

        let result = client.complete("hi", "gpt-4", 0.7, 100, None).await;
        assert_eq!(result.response(), Some("third time lucky"));
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_message() {
        let backend = Arc::new(ScriptedBackend::repeating(Err(BackendError::RateLimited(
            "429".into(),
        ))));
        let client = client_with(backend.clone(), 2);

        let result = client.complete("hi", "gpt-4", 0.7, 100, None).await;
        assert_eq!(
            result.error(),
            Some("Rate limit exceeded. Please try again later.")
        );
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_response_fails_without_retry() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(ChatResponse::default()),
            ok("never reached"),
        ]));
        let client = client_with(backend.clone(), 3);

        let result = client.complete("hi", "gpt-4", 0.7, 100, None).await;
        assert_eq!(result.error(), Some("Empty response from API"));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_retried_when_enabled() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(ChatResponse {
                content: Some("   ".into()),
                total_tokens: None,
            }),
            ok("second"),
        ]));
        let mut policy = RetryPolicy::immediate(3);
        policy.retry_empty_response = true;
        let client = CompletionClient::new(backend.clone(), ModelCatalog::builtin(), policy);

        let result = client.complete("hi", "gpt-4", 0.7, 100, None).await;
        assert_eq!(result.response(), Some("second"));
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_connection_uses_fixed_message() {
        let backend = Arc::new(ScriptedBackend::replying("pong"));
        let client = client_with(backend.clone(), 1);

        assert!(client.test_connection("gpt-4").await.is_success());
        assert_eq!(
            backend.requests()[0].messages[0].content,
            CONNECTION_TEST_MESSAGE
        );
    }

    #[test]
    fn test_backoff_escalates_and_depends_on_class() {
        let policy = RetryPolicy::default();
        let api = BackendError::Api("x".into());
        let rate = BackendError::RateLimited("x".into());
        assert_eq!(policy.backoff_for(&api, 1), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(&api, 2), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(&rate, 1), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(&rate, 2), Duration::from_secs(4));
    }

    #[test]
    fn test_clamp_temperature_handles_nan() {
        assert_eq!(clamp_temperature(f64::NAN, 0.7), 0.7);
        assert_eq!(clamp_temperature(f64::INFINITY, 0.7), 2.0);
        assert_eq!(clamp_temperature(1.3, 0.7), 1.3);
    }

    #[test]
    fn test_result_serializes_with_status_tag() {
        let result = CompletionResult::failure("boom", 0.5);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "failure");
        assert_eq!(value["error"], "boom");
        assert!(value.get("response").is_none());
    }
}
