/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `chat`: interactive chat session
- `ask`: send a single prompt
- `estimate`: pre-flight cost estimate
- `check`: connection and credential test
- `history`: stored conversation management
- `models`: model table inspection

Handlers are thin: they wire configuration into a [`ChatSession`] or a
[`CompletionClient`] and format the results.
*/

use crate::cli::ChatOverrides;
use crate::completion::CompletionClient;
use crate::config::Config;
use crate::error::{Result, ParleyError};
use crate::providers::{create_backend, CompletionBackend};
use crate::session::{ChatSession, ChatSettings};
use crate::storage::ConversationStore;
use std::sync::Arc;

// Stored conversation management
pub mod history;

// Model table commands
pub mod models;

// Slash command parser for the chat loop
pub mod special_commands;

/// Build a completion client against the configured API
///
/// # Errors
///
/// Returns error if the API key is missing or the HTTP client cannot be
/// created.
pub fn build_client(config: &Config) -> Result<CompletionClient> {
    config.validate_credentials()?;
    let backend: Arc<dyn CompletionBackend> = Arc::from(create_backend(&config.api)?);
    Ok(CompletionClient::from_config(config, backend))
}

/// Build a chat session from configuration and per-invocation overrides
pub fn build_session(config: &Config, overrides: &ChatOverrides) -> Result<ChatSession> {
    let client = build_client(config)?;
    let store = ConversationStore::from_config(&config.storage)?;
    let settings = apply_overrides(ChatSettings::from_config(&config.chat), overrides);
    Ok(ChatSession::new(store, client, settings))
}

/// Apply command-line overrides on top of configured settings
pub fn apply_overrides(mut settings: ChatSettings, overrides: &ChatOverrides) -> ChatSettings {
    if let Some(model) = &overrides.model {
        settings.model = model.clone();
    }
    if let Some(temperature) = overrides.temperature {
        settings.temperature = temperature;
    }
    if let Some(max_tokens) = overrides.max_tokens {
        settings.max_tokens = max_tokens;
    }
    if overrides.system.is_some() {
        settings.set_system_prompt(overrides.system.clone());
    }
    settings
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Builds a [`ChatSession`] and runs a readline loop: slash commands
    //! change session state, everything else is sent to the model.

    use super::*;
    use crate::commands::history::{print_summary_table, render_transcript};
    use crate::commands::models::format_cost;
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use crate::completion::CompletionResult;
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Conversations shown by `/list`
    const RECENT_LIMIT: usize = 10;

    /// Title width used by `/list`
    const RECENT_TITLE_WIDTH: usize = 25;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `conversation` - Optional conversation id to resume
    /// * `overrides` - Per-invocation settings
    pub async fn run_chat(
        config: Config,
        conversation: Option<String>,
        overrides: ChatOverrides,
    ) -> Result<()> {
        let mut session = build_session(&config, &overrides)?;

        if let Some(id) = &conversation {
            let loaded = session.switch_to(id)?;
            println!(
                "Resumed \"{}\" ({} messages)",
                loaded.title,
                loaded.messages.len()
            );
        }

        let mut rl = DefaultEditor::new()?;

        print_welcome_banner(&session);

        loop {
            match rl.readline("parley> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match parse_special_command(trimmed) {
                        Ok(SpecialCommand::None) => {}
                        Ok(command) => {
                            match handle_special_command(&mut session, command) {
                                Ok(true) => continue,
                                Ok(false) => break,
                                Err(e) => {
                                    eprintln!("{}\n", format!("Error: {}", e).red());
                                    continue;
                                }
                            }
                        }
                        Err(e) => {
                            eprintln!("{}\n", e.to_string().red());
                            continue;
                        }
                    }

                    rl.add_history_entry(trimmed)?;

                    match session.send(trimmed).await {
                        Ok(outcome) => print_result(&outcome.result),
                        Err(e) => eprintln!("{}\n", format!("Error: {}", e).red()),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Apply a slash command; returns `false` when the loop should stop
    pub fn handle_special_command(
        session: &mut ChatSession,
        command: SpecialCommand,
    ) -> Result<bool> {
        match command {
            SpecialCommand::NewConversation(title) => {
                let id = session.new_conversation(title.as_deref())?;
                println!("{}\n", format!("Started conversation {}", id).green());
            }
            SpecialCommand::ListConversations => {
                let recent = session.list_recent(RECENT_LIMIT)?;
                if recent.is_empty() {
                    println!("{}\n", "No conversation history found.".yellow());
                } else {
                    print_summary_table(&recent, RECENT_TITLE_WIDTH);
                    println!();
                }
            }
            SpecialCommand::LoadConversation(id) => {
                let loaded = session.switch_to(&id)?;
                println!(
                    "{}\n",
                    format!(
                        "Loaded \"{}\" ({} messages)",
                        loaded.title,
                        loaded.messages.len()
                    )
                    .green()
                );
            }
            SpecialCommand::DeleteConversation(id) => {
                if session.delete(&id)? {
                    println!("{}\n", format!("Deleted conversation {}", id).green());
                } else {
                    println!("{}\n", format!("No conversation with id {}", id).yellow());
                }
            }
            SpecialCommand::ShowModel => {
                println!("Current model: {}\n", session.settings().model.cyan());
            }
            SpecialCommand::SwitchModel(model) => {
                if !session.client().catalog().contains(&model) {
                    return Err(ParleyError::UnknownModel(model).into());
                }
                let old = std::mem::replace(&mut session.settings_mut().model, model);
                println!(
                    "Switched from {} to {}\n",
                    old,
                    session.settings().model.cyan()
                );
            }
            SpecialCommand::ListModels => {
                for spec in session.client().available_models() {
                    let marker = if spec.id == session.settings().model {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{} {:<16} {:<14} {} / 1K tokens, max {}",
                        marker,
                        spec.id,
                        spec.name,
                        format_cost(spec.cost_per_1k),
                        spec.max_tokens
                    );
                }
                println!();
            }
            SpecialCommand::SetTemperature(t) => {
                session.settings_mut().temperature = t;
                println!("Temperature set to {}\n", t);
            }
            SpecialCommand::SetMaxTokens(n) => {
                session.settings_mut().max_tokens = n;
                println!("Max tokens set to {}\n", n);
                let model = session.settings().model.clone();
                if let Some(spec) = session.client().catalog().get(&model) {
                    if n > spec.max_tokens {
                        println!(
                            "{}\n",
                            format!("{} allows at most {} tokens", spec.id, spec.max_tokens)
                                .yellow()
                        );
                    }
                }
            }
            SpecialCommand::SetSystemPrompt(prompt) => {
                session.settings_mut().set_system_prompt(prompt);
                match &session.settings().system_prompt {
                    Some(_) => println!("System prompt set\n"),
                    None => println!("System prompt cleared\n"),
                }
            }
            SpecialCommand::ShowHistory => match session.load_current()? {
                Some(conversation) => print!("{}", render_transcript(&conversation)),
                None => println!("{}\n", "No active conversation.".yellow()),
            },
            SpecialCommand::ShowStatus => print_status(session)?,
            SpecialCommand::Help => print_help(),
            SpecialCommand::Exit => return Ok(false),
            SpecialCommand::None => {}
        }

        Ok(true)
    }

    fn print_result(result: &CompletionResult) {
        match result {
            CompletionResult::Success {
                response,
                model_used,
                tokens_used,
                estimated_cost,
                response_time,
            } => {
                println!("\n{}\n", response);
                let tokens = tokens_used
                    .map(|t| format!(" · {} tokens", t))
                    .unwrap_or_default();
                println!(
                    "{}\n",
                    format!(
                        "{} · {}{} · {}",
                        model_used,
                        crate::session::format_response_time(*response_time),
                        tokens,
                        format_cost(*estimated_cost)
                    )
                    .dimmed()
                );
            }
            CompletionResult::Failure { error, .. } => {
                eprintln!("{}\n", format!("Error: {}", error).red());
            }
        }
    }

    fn print_welcome_banner(session: &ChatSession) {
        println!();
        println!("{}", "Parley interactive chat".bold());
        println!(
            "Model: {}  Temperature: {}  Max tokens: {}",
            session.settings().model.cyan(),
            session.settings().temperature,
            session.settings().max_tokens
        );
        println!("Type '/help' for commands, '/exit' to leave.\n");
    }

    fn print_status(session: &ChatSession) -> Result<()> {
        let settings = session.settings();
        println!("\nSession Status\n");
        println!("Model:          {}", settings.model);
        println!("Temperature:    {}", settings.temperature);
        println!("Max tokens:     {}", settings.max_tokens);
        println!(
            "System prompt:  {}",
            settings.system_prompt.as_deref().unwrap_or("(none)")
        );
        match session.load_current()? {
            Some(conversation) => println!(
                "Conversation:   {} \"{}\" ({} messages)",
                conversation.id,
                conversation.title,
                conversation.messages.len()
            ),
            None => println!("Conversation:   (none yet)"),
        }
        println!("History dir:    {}", session.store().dir().display());
        println!();
        Ok(())
    }

}

// Single-prompt command handler
pub mod ask {
    use super::*;
    use crate::commands::models::format_cost;
    use crate::completion::CompletionResult;
    use colored::Colorize;

    /// Send one prompt, print the reply, and persist the exchange
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be built, the conversation to
    /// resume does not exist, or the completion fails.
    pub async fn run_ask(
        config: Config,
        prompt: String,
        conversation: Option<String>,
        overrides: ChatOverrides,
        json: bool,
    ) -> Result<()> {
        let mut session = build_session(&config, &overrides)?;
        if let Some(id) = &conversation {
            session.switch_to(id)?;
        }

        let outcome = session.send(&prompt).await?;
        tracing::debug!("Exchange stored in {}", outcome.conversation_id);

        if json {
            let json =
                serde_json::to_string_pretty(&outcome).map_err(ParleyError::Serialization)?;
            println!("{}", json);
        }

        match &outcome.result {
            CompletionResult::Success {
                response,
                model_used,
                estimated_cost,
                response_time,
                ..
            } => {
                if !json {
                    println!("{}", response);
                    eprintln!(
                        "{}",
                        format!(
                            "{} · {} · {} · conversation {}",
                            model_used,
                            crate::session::format_response_time(*response_time),
                            format_cost(*estimated_cost),
                            outcome.conversation_id
                        )
                        .dimmed()
                    );
                }
                Ok(())
            }
            CompletionResult::Failure { error, .. } => {
                Err(ParleyError::Provider(error.clone()).into())
            }
        }
    }
}

// Cost estimate command handler
pub mod estimate {
    use super::*;
    use crate::commands::models::format_cost;
    use crate::completion::catalog::{estimate_tokens, ModelCatalog};

    /// Print the pre-flight cost of sending `text` to `model`
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::UnknownModel` if the model is not in the table
    pub fn run_estimate(config: &Config, text: &str, model: Option<&str>) -> Result<()> {
        let catalog = ModelCatalog::from_config(config);
        let model = model.unwrap_or(catalog.default_model());
        if !catalog.contains(model) {
            return Err(ParleyError::UnknownModel(model.to_string()).into());
        }

        println!("Model:            {}", model);
        println!("Characters:       {}", text.chars().count());
        println!("Estimated tokens: {:.2}", estimate_tokens(text));
        println!(
            "Estimated cost:   {}",
            format_cost(catalog.estimate_cost(text, model))
        );
        Ok(())
    }

}

// Connection test command handler
pub mod check {
    use super::*;
    use crate::completion::CompletionResult;
    use colored::Colorize;

    /// Send the connection test message and report the outcome
    ///
    /// # Errors
    ///
    /// Returns error if credentials are missing or the test call fails
    pub async fn run_check(config: &Config, model: Option<&str>) -> Result<()> {
        let client = build_client(config)?;
        let model = model.unwrap_or(&config.chat.default_model);
        tracing::info!("Testing connection with model {}", model);

        match client.test_connection(model).await {
            CompletionResult::Success {
                model_used,
                response_time,
                ..
            } => {
                println!(
                    "{} {} responded in {}",
                    "Connection OK:".green(),
                    model_used,
                    crate::session::format_response_time(response_time)
                );
                Ok(())
            }
            CompletionResult::Failure { error, .. } => {
                Err(ParleyError::Provider(format!("Connection test failed: {}", error)).into())
            }
        }
    }
}
