//! Backend trait and wire-neutral request/response types
//!
//! A [`CompletionBackend`] performs exactly one remote call. Retry,
//! validation and cost estimation live in [`crate::completion`]; the
//! backend only classifies what went wrong so the retry loop can decide
//! whether another attempt makes sense.

use crate::storage::Role;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One prompt turn sent to the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the turn
    pub role: Role,
    /// Turn text
    pub content: String,
}

impl ChatMessage {
    /// Creates a system turn
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::providers::ChatMessage;
    /// use parley::storage::Role;
    ///
    /// let msg = ChatMessage::system("You are terse.");
    /// assert_eq!(msg.role, Role::System);
    /// ```
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A fully resolved request for a single remote call
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model identifier known to the remote side
    pub model: String,
    /// Ordered prompt (optional system turn, then the user turn)
    pub messages: Vec<ChatMessage>,
    /// Response length ceiling, already clamped to the model maximum
    pub max_tokens: u32,
    /// Sampling temperature, already clamped into [0.0, 2.0]
    pub temperature: f64,
    /// Upper bound on the call's duration
    pub timeout: Duration,
}

/// What the remote side returned for a successful call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    /// Text of the first choice, if any
    pub content: Option<String>,
    /// Total tokens reported by the remote side
    pub total_tokens: Option<u64>,
}

/// Classified failure of a single remote call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Credentials were rejected; retrying cannot help
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The remote side asked us to slow down
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The API reported an error or could not be reached
    #[error("{0}")]
    Api(String),

    /// Anything else (undecodable body, client bug)
    #[error("{0}")]
    Unexpected(String),
}

impl BackendError {
    /// Whether another attempt may succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Authentication(_))
    }
}

/// A remote chat-completion endpoint
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Perform one remote call
    ///
    /// # Errors
    ///
    /// Returns a classified [`BackendError`] when the call does not produce
    /// a decodable response.
    async fn chat_completion(
        &self,
        request: &ChatRequest,
    ) -> std::result::Result<ChatResponse, BackendError>;
}
