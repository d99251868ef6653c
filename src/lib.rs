//! Parley - terminal chat client library
//!
//! This library provides the core functionality for Parley: a file-backed
//! conversation store, a retrying chat-completion client, and the session
//! layer that ties them together.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `storage`: JSON-file conversation persistence
//! - `providers`: Completion backend abstraction and the OpenAI-compatible client
//! - `completion`: Validation, model resolution, retry, and cost estimation
//! - `session`: Conversation/turn orchestration with explicit state
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use parley::{ChatSession, ChatSettings, CompletionClient, Config, ConversationStore};
//! use parley::providers::OpenAiBackend;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let backend = Arc::new(OpenAiBackend::new(&config.api)?);
//!     let client = CompletionClient::from_config(&config, backend);
//!     let store = ConversationStore::from_config(&config.storage)?;
//!     let mut session = ChatSession::new(store, client, ChatSettings::from_config(&config.chat));
//!
//!     let outcome = session.send("Hello").await?;
//!     println!("{:?}", outcome.result.response());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod completion;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use completion::{CompletionClient, CompletionResult};
pub use config::Config;
pub use error::{ParleyError, Result};
pub use session::{ChatSession, ChatSettings, TurnOutcome};
pub use storage::{Conversation, ConversationStore, Message, Role};
