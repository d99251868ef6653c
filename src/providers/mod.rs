//! Provider module for Parley
//!
//! This module contains the chat-completion backend abstraction, the
//! OpenAI-compatible HTTP implementation, and a scripted fake for tests.

pub mod base;
#[cfg(test)]
pub mod fake;
pub mod openai;

pub use base::{BackendError, ChatMessage, ChatRequest, ChatResponse, CompletionBackend};
pub use openai::OpenAiBackend;

use crate::config::ApiConfig;
use crate::error::Result;

/// Create the backend described by configuration
///
/// # Errors
///
/// Returns error if the API key is missing or the HTTP client cannot be
/// initialized.
pub fn create_backend(config: &ApiConfig) -> Result<Box<dyn CompletionBackend>> {
    Ok(Box::new(OpenAiBackend::new(config)?))
}
