//! Special commands parser for interactive chat mode
//!
//! This module parses the slash commands that can be entered during an
//! interactive chat session. Special commands allow users to:
//! - Start, list, load, and delete conversations
//! - Change the model, temperature, token limit, and system prompt
//! - View the current conversation and session status
//! - Exit the session
//!
//! Command names are case-insensitive; arguments keep their case.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
///
/// These commands change session state or print information rather than
/// being sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecialCommand {
    /// Start a new conversation, optionally titled
    NewConversation(Option<String>),

    /// Show the most recently updated conversations
    ListConversations,

    /// Make an existing conversation current
    LoadConversation(String),

    /// Delete a conversation
    DeleteConversation(String),

    /// Show the current model
    ShowModel,

    /// Use a different model for subsequent turns
    SwitchModel(String),

    /// List the model table
    ListModels,

    /// Set the sampling temperature
    SetTemperature(f64),

    /// Set the requested response length
    SetMaxTokens(u32),

    /// Replace the system prompt; `None` clears it
    SetSystemPrompt(Option<String>),

    /// Print the current conversation
    ShowHistory,

    /// Print the current settings and conversation
    ShowStatus,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command; the input is a chat message
    None,
}

/// Parse user input into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` if input starts with "/" but is
/// not a valid command, `CommandError::MissingArgument` if a required
/// argument is absent, and `CommandError::UnsupportedArgument` if an
/// argument cannot be used.
///
/// # Examples
///
/// ```
/// use parley::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// let cmd = parse_special_command("/model gpt-4").unwrap();
/// assert_eq!(cmd, SpecialCommand::SwitchModel("gpt-4".to_string()));
///
/// let cmd = parse_special_command("/NEW Trip Planning").unwrap();
/// assert_eq!(cmd, SpecialCommand::NewConversation(Some("Trip Planning".to_string())));
///
/// let cmd = parse_special_command("hello there").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
///
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let (name, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name.to_lowercase(), rest.trim()),
        None => (trimmed.to_lowercase(), ""),
    };

    // Bare exit/quit work without the slash
    if !trimmed.starts_with('/') {
        return match (name.as_str(), arg) {
            ("exit" | "quit", "") => Ok(SpecialCommand::Exit),
            _ => Ok(SpecialCommand::None),
        };
    }

    match name.as_str() {
        "/new" => Ok(SpecialCommand::NewConversation(non_empty(arg))),
        "/list" => no_argument("/list", arg, SpecialCommand::ListConversations),
        "/load" => required("/load", "/load <conversation_id>", arg)
            .map(SpecialCommand::LoadConversation),
        "/delete" => required("/delete", "/delete <conversation_id>", arg)
            .map(SpecialCommand::DeleteConversation),

        "/model" => match non_empty(arg) {
            Some(model) => Ok(SpecialCommand::SwitchModel(model)),
            None => Ok(SpecialCommand::ShowModel),
        },
        "/models" => no_argument("/models", arg, SpecialCommand::ListModels),

        "/temperature" | "/temp" => {
            let value = required("/temperature", "/temperature <0.0-2.0>", arg)?;
            match value.parse::<f64>() {
                Ok(t) if (0.0..=2.0).contains(&t) => Ok(SpecialCommand::SetTemperature(t)),
                _ => Err(CommandError::UnsupportedArgument {
                    command: "/temperature".to_string(),
                    arg: value,
                }),
            }
        }
        "/max-tokens" | "/max_tokens" => {
            let value = required("/max-tokens", "/max-tokens <n>", arg)?;
            match value.parse::<u32>() {
                Ok(n) if n > 0 => Ok(SpecialCommand::SetMaxTokens(n)),
                _ => Err(CommandError::UnsupportedArgument {
                    command: "/max-tokens".to_string(),
                    arg: value,
                }),
            }
        }
        "/system" => Ok(SpecialCommand::SetSystemPrompt(non_empty(arg))),

        "/history" => no_argument("/history", arg, SpecialCommand::ShowHistory),
        "/status" => no_argument("/status", arg, SpecialCommand::ShowStatus),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),

        _ => Err(CommandError::UnknownCommand(name)),
    }
}

fn non_empty(arg: &str) -> Option<String> {
    if arg.is_empty() {
        None
    } else {
        Some(arg.to_string())
    }
}

fn required(command: &str, usage: &str, arg: &str) -> Result<String, CommandError> {
    non_empty(arg).ok_or_else(|| CommandError::MissingArgument {
        command: command.to_string(),
        usage: usage.to_string(),
    })
}

fn no_argument(
    command: &str,
    arg: &str,
    cmd: SpecialCommand,
) -> Result<SpecialCommand, CommandError> {
    if arg.is_empty() {
        Ok(cmd)
    } else {
        Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        })
    }
}

/// Display help text for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

CONVERSATIONS:
  /new [title]        - Start a new conversation
  /list               - Show the 10 most recent conversations
  /load <id>          - Continue an existing conversation
  /delete <id>        - Delete a conversation
  /history            - Print the current conversation

SETTINGS:
  /model              - Show the current model
  /model <id>         - Switch to a different model
  /models             - List available models
  /temperature <t>    - Set temperature (0.0 to 2.0)
  /max-tokens <n>     - Set maximum response tokens
  /system [text]      - Set the system prompt; without text, clear it

SESSION:
  /status             - Show current settings and conversation
  /help               - Show this help message
  /exit               - Exit (also: exit, quit, Ctrl-D)

NOTES:
  - Command names are case-insensitive
  - Anything not starting with / is sent to the model
"#
    );
}
