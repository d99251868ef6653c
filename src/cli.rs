//! Command-line interface definition for Parley
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, one-shot prompts, history
//! management, and model information.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Parley - Chat with OpenAI-compatible models from the terminal
///
/// Conversations are stored as JSON files and can be resumed, listed,
/// and deleted.
#[derive(Parser, Debug, Clone)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory holding conversation records
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Per-invocation overrides of the `chat` configuration section
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ChatOverrides {
    /// Model to request
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature (0.0 to 2.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Maximum response tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// System prompt sent ahead of each message
    #[arg(short, long)]
    pub system: Option<String>,
}

/// Available commands for Parley
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Resume an existing conversation by id
        #[arg(long)]
        conversation: Option<String>,

        #[command(flatten)]
        overrides: ChatOverrides,
    },

    /// Send a single prompt and print the reply
    Ask {
        /// Prompt text
        prompt: String,

        /// Append to an existing conversation instead of creating one
        #[arg(long)]
        conversation: Option<String>,

        #[command(flatten)]
        overrides: ChatOverrides,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage stored conversations
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Inspect the model table
    Models {
        /// Model subcommand
        #[command(subcommand)]
        command: ModelCommand,
    },

    /// Estimate the cost of sending a message
    Estimate {
        /// Message text
        text: String,

        /// Model to price against (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Send a short test message to verify connectivity and credentials
    Check {
        /// Model to test (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,
    },
}

/// Conversation history subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List stored conversations, most recently updated first
    List {
        /// Show at most this many conversations
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print every message of a conversation
    Show {
        /// Conversation id
        id: String,

        /// Output JSON instead of a transcript
        #[arg(long)]
        json: bool,
    },

    /// Create an empty conversation and print its id
    New {
        /// Title (defaults to a timestamped title)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Delete a conversation
    Delete {
        /// Conversation id
        id: String,
    },
}

/// Model table subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ModelCommand {
    /// List available models
    List {
        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show detailed information about a model
    Info {
        /// Model identifier
        model: String,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
