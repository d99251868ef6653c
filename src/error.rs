//! Error types for Parley
//!
//! This module defines the error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Parley operations
///
/// Covers configuration loading, input validation, provider interactions
/// and conversation storage. Expected remote failures do not use this type
/// at the completion boundary; they resolve to a
/// [`CompletionResult::Failure`](crate::completion::CompletionResult) instead.
#[derive(Error, Debug)]
pub enum ParleyError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input rejected before any work was done
    #[error("Validation error: {0}")]
    Validation(String),

    /// Provider-related errors (client construction, transport setup)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Authentication errors (e.g., 401 Unauthorized, missing key)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Requested model is not present in the capability table
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Conversation storage errors (real I/O failures, not missing records)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Parley operations
///
/// Uses `anyhow::Error` so call sites can attach context while still
/// carrying a [`ParleyError`] that callers can downcast.
pub type Result<T> = anyhow::Result<T>;
