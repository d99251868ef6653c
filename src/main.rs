//! Parley - terminal chat client for OpenAI-compatible APIs
//!
//! Main entry point for the Parley application.

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley::cli::{Cli, Commands, ModelCommand};
use parley::commands;
use parley::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat {
            conversation,
            overrides,
        } => {
            tracing::info!("Starting interactive chat mode");
            if let Some(id) = &conversation {
                tracing::debug!("Resuming conversation: {}", id);
            }
            commands::chat::run_chat(config, conversation, overrides).await?;
            Ok(())
        }
        Commands::Ask {
            prompt,
            conversation,
            overrides,
            json,
        } => {
            tracing::info!("Sending single prompt");
            commands::ask::run_ask(config, prompt, conversation, overrides, json).await?;
            Ok(())
        }
        Commands::History { command } => {
            tracing::debug!("Starting history command");
            commands::history::handle_history(&config, command)?;
            Ok(())
        }
        Commands::Models { command } => match command {
            ModelCommand::List { json } => {
                commands::models::list_models(&config, json)?;
                Ok(())
            }
            ModelCommand::Info { model, json } => {
                commands::models::show_model_info(&config, &model, json)?;
                Ok(())
            }
        },
        Commands::Estimate { text, model } => {
            commands::estimate::run_estimate(&config, &text, model.as_deref())?;
            Ok(())
        }
        Commands::Check { model } => {
            commands::check::run_check(&config, model.as_deref()).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "parley=debug" } else { "parley=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
