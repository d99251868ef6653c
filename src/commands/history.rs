use crate::cli::HistoryCommand;
use crate::config::Config;
use crate::error::{Result, ParleyError};
use crate::storage::{Conversation, ConversationStore, ConversationSummary, Role};
use chrono::Local;
use colored::Colorize;
use prettytable::{format, Table};

/// Titles longer than this are shortened in listings
const LIST_TITLE_WIDTH: usize = 40;

/// Handle history commands
pub fn handle_history(config: &Config, command: HistoryCommand) -> Result<()> {
    let store = ConversationStore::from_config(&config.storage)?;

    match command {
        HistoryCommand::List { limit, json } => {
            let summaries = match limit {
                Some(limit) => store.list_recent(limit)?,
                None => store.list_all()?,
            };

            if json {
                let json =
                    serde_json::to_string_pretty(&summaries).map_err(ParleyError::Serialization)?;
                println!("{}", json);
                return Ok(());
            }

            if summaries.is_empty() {
                println!("{}", "No conversation history found.".yellow());
                return Ok(());
            }

            println!("\nConversation History:");
            print_summary_table(&summaries, LIST_TITLE_WIDTH);
            println!();
            println!(
                "Use {} to resume a conversation.",
                "parley chat --conversation <ID>".cyan()
            );
            println!();
        }
        HistoryCommand::Show { id, json } => {
            let conversation = store
                .load(&id)?
                .ok_or_else(|| ParleyError::Validation(format!("Conversation not found: {}", id)))?;

            if json {
                let json = serde_json::to_string_pretty(&conversation)
                    .map_err(ParleyError::Serialization)?;
                println!("{}", json);
            } else {
                print!("{}", render_transcript(&conversation));
            }
        }
        HistoryCommand::New { title } => {
            let id = store.create(title.as_deref())?;
            println!("{}", id);
        }
        HistoryCommand::Delete { id } => {
            if store.delete(&id)? {
                println!("{}", format!("Deleted conversation {}", id).green());
            } else {
                return Err(
                    ParleyError::Validation(format!("Conversation not found: {}", id)).into(),
                );
            }
        }
    }

    Ok(())
}

/// Print summaries as a bordered table
pub fn print_summary_table(summaries: &[ConversationSummary], title_width: usize) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Messages".bold(),
        "Last Updated".bold()
    ]);

    for summary in summaries {
        let updated = summary
            .updated_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();

        table.add_row(prettytable::row![
            summary.id.cyan(),
            summary.display_title(title_width),
            summary.message_count,
            updated
        ]);
    }

    table.printstd();
}

/// Plain-text transcript of a conversation
pub fn render_transcript(conversation: &Conversation) -> String {
    let mut out = format!("\n{} ({})\n\n", conversation.title, conversation.id);

    if conversation.messages.is_empty() {
        out.push_str("(no messages)\n\n");
        return out;
    }

    for message in &conversation.messages {
        let when = message.timestamp.with_timezone(&Local).format("%H:%M");
        let label = match message.role {
            Role::User => "You".to_string(),
            Role::Assistant => "Assistant".to_string(),
            Role::System => "System".to_string(),
        };
        out.push_str(&format!("[{}] {}:\n{}\n", when, label, message.content));

        let meta = &message.metadata;
        if let (Some(model), Some(time)) = (&meta.model_used, &meta.response_time) {
            let tokens = meta
                .tokens_used
                .map(|t| format!(", {} tokens", t))
                .unwrap_or_default();
            out.push_str(&format!("  ({}, {}{})\n", model, time, tokens));
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Message, MessageMetadata};

    #[test]
    fn test_render_transcript_empty() {
        let conv = Conversation::new("01ABC", "Empty");
        let text = render_transcript(&conv);
        assert!(text.contains("Empty (01ABC)"));
        assert!(text.contains("(no messages)"));
    }

    #[test]
    fn test_render_transcript_includes_metadata_line() {
        let mut conv = Conversation::new("01ABC", "Trip");
        conv.messages.push(Message::new(Role::User, "Where to?", None));
        conv.messages.push(Message::new(
            Role::Assistant,
            "Lisbon.",
            Some(MessageMetadata {
                response_time: Some("850ms".into()),
                model_used: Some("gpt-4".into()),
                tokens_used: Some(42),
                ..Default::default()
            }),
        ));

        let text = render_transcript(&conv);
        assert!(text.contains("You:\nWhere to?"));
        assert!(text.contains("Assistant:\nLisbon."));
        assert!(text.contains("(gpt-4, 850ms, 42 tokens)"));
    }

    #[test]
    fn test_render_transcript_skips_metadata_for_apology() {
        let mut conv = Conversation::new("01ABC", "Oops");
        conv.messages.push(Message::new(
            Role::Assistant,
            "I apologize, but I encountered an error: boom",
            None,
        ));
        let text = render_transcript(&conv);
        assert!(!text.contains("tokens)"));
    }
}
