//! Chat session orchestration
//!
//! [`ChatSession`] sequences the conversation store and the completion
//! client for one user: it holds the current conversation id and request
//! settings explicitly, persists the user turn, asks for a completion, and
//! persists the assistant turn (or an apology when the call failed).

use crate::completion::{CompletionClient, CompletionResult};
use crate::config::ChatConfig;
use crate::error::{Result, ParleyError};
use crate::storage::{Conversation, ConversationStore, ConversationSummary, MessageMetadata, Role};
use serde::Serialize;

/// Request settings applied to every turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatSettings {
    /// Requested model id
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Requested response length
    pub max_tokens: u32,
    /// Optional system prompt; never blank
    pub system_prompt: Option<String>,
}

impl ChatSettings {
    /// Settings taken from the `chat` configuration section
    pub fn from_config(config: &ChatConfig) -> Self {
        let mut settings = Self {
            model: config.default_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: None,
        };
        settings.set_system_prompt(config.system_prompt.clone());
        settings
    }

    /// Replace the system prompt; blank text clears it
    pub fn set_system_prompt(&mut self, prompt: Option<String>) {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
    }
}

/// Result of one [`ChatSession::send`]
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// Conversation both turns were appended to
    pub conversation_id: String,
    /// Pre-flight cost estimate for the user text
    pub estimated_cost: f64,
    /// What the completion client returned
    pub result: CompletionResult,
}

/// Stateful chat front-end over a store and a client
pub struct ChatSession {
    store: ConversationStore,
    client: CompletionClient,
    settings: ChatSettings,
    conversation_id: Option<String>,
}

impl ChatSession {
    /// Create a session with no current conversation
    pub fn new(store: ConversationStore, client: CompletionClient, settings: ChatSettings) -> Self {
        Self {
            store,
            client,
            settings,
            conversation_id: None,
        }
    }

    /// The underlying store
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// The underlying completion client
    pub fn client(&self) -> &CompletionClient {
        &self.client
    }

    /// Current request settings
    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Mutable request settings
    pub fn settings_mut(&mut self) -> &mut ChatSettings {
        &mut self.settings
    }

    /// Id of the current conversation, if any
    pub fn current_conversation(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// The current conversation id, creating a conversation when there is none
    pub fn ensure_conversation(&mut self) -> Result<String> {
        match &self.conversation_id {
            Some(id) => Ok(id.clone()),
            None => self.new_conversation(None),
        }
    }

    /// Create a conversation and make it current
    pub fn new_conversation(&mut self, title: Option<&str>) -> Result<String> {
        let id = self.store.create(title)?;
        self.conversation_id = Some(id.clone());
        Ok(id)
    }

    /// Make an existing conversation current
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Validation` if no such conversation exists.
    pub fn switch_to(&mut self, id: &str) -> Result<Conversation> {
        let conversation = self
            .store
            .load(id)?
            .ok_or_else(|| ParleyError::Validation(format!("Conversation not found: {}", id)))?;
        self.conversation_id = Some(conversation.id.clone());
        tracing::info!("Switched to conversation {}", conversation.id);
        Ok(conversation)
    }

    /// Delete a conversation; the session forgets it if it was current
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let deleted = self.store.delete(id)?;
        if deleted && self.conversation_id.as_deref() == Some(id) {
            self.conversation_id = None;
        }
        Ok(deleted)
    }

    /// Load the current conversation
    pub fn load_current(&self) -> Result<Option<Conversation>> {
        match &self.conversation_id {
            Some(id) => self.store.load(id),
            None => Ok(None),
        }
    }

    /// Most recently updated conversations
    pub fn list_recent(&self, limit: usize) -> Result<Vec<ConversationSummary>> {
        self.store.list_recent(limit)
    }

    /// Run one exchange: persist the user turn, complete, persist the reply
    ///
    /// Remote failures do not make this return `Err`; they are recorded in
    /// the conversation as an assistant apology and reported through
    /// [`TurnOutcome::result`].
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Validation` when the sanitized text is empty,
    /// and storage errors when the conversation cannot be written.
    pub async fn send(&mut self, text: &str) -> Result<TurnOutcome> {
        let message = sanitize_input(text);
        if message.is_empty() {
            return Err(ParleyError::Validation("Please enter a valid message.".to_string()).into());
        }

        let conversation_id = self.ensure_conversation()?;
        let estimated_cost = self.client.estimate_cost(&message, &self.settings.model);

        if !self
            .store
            .append_message(&conversation_id, Role::User, &message, None)?
        {
            self.conversation_id = None;
            return Err(ParleyError::Storage(format!(
                "Conversation {} no longer exists",
                conversation_id
            ))
            .into());
        }

        let result = self
            .client
            .complete(
                &message,
                &self.settings.model,
                self.settings.temperature,
                self.settings.max_tokens,
                self.settings.system_prompt.as_deref(),
            )
            .await;

        match &result {
            CompletionResult::Success {
                response,
                model_used,
                tokens_used,
                estimated_cost,
                response_time,
            } => {
                let metadata = MessageMetadata {
                    response_time: Some(format_response_time(*response_time)),
                    model_used: Some(model_used.clone()),
                    tokens_used: *tokens_used,
                    estimated_cost: Some(*estimated_cost),
                    temperature: Some(self.settings.temperature),
                    max_tokens: Some(self.settings.max_tokens),
                    system_prompt_used: Some(self.settings.system_prompt.is_some()),
                };
                self.store.append_message(
                    &conversation_id,
                    Role::Assistant,
                    response,
                    Some(metadata),
                )?;
            }
            CompletionResult::Failure { error, .. } => {
                tracing::warn!("Recording failed exchange in {}: {}", conversation_id, error);
                self.store.append_message(
                    &conversation_id,
                    Role::Assistant,
                    &apology(error),
                    None,
                )?;
            }
        }

        Ok(TurnOutcome {
            conversation_id,
            estimated_cost,
            result,
        })
    }
}

/// Assistant text recorded when a completion fails
pub fn apology(error: &str) -> String {
    format!("I apologize, but I encountered an error: {}", error)
}

/// Trim input and drop control characters other than newline and tab
///
/// # Examples
///
/// ```
/// use parley::session::sanitize_input;
///
/// assert_eq!(sanitize_input("  hi\u{7}\tthere \n"), "hi\tthere");
/// assert_eq!(sanitize_input(" \u{0} "), "");
/// ```
pub fn sanitize_input(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Render seconds as "850ms" below one second, "1.42s" otherwise
pub fn format_response_time(seconds: f64) -> String {
    let millis = (seconds * 1000.0).round();
    if millis < 1000.0 {
        format!("{:.0}ms", millis)
    } else {
        format!("{:.2}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::catalog::ModelCatalog;
    use crate::completion::RetryPolicy;
    use crate::providers::fake::ScriptedBackend;
    use crate::providers::BackendError;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn session_with(backend: Arc<ScriptedBackend>) -> (ChatSession, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let store = ConversationStore::new_with_path(dir.path()).expect("store");
        let client =
            CompletionClient::new(backend, ModelCatalog::builtin(), RetryPolicy::immediate(2));
        let settings = ChatSettings::from_config(&ChatConfig::default());
        (ChatSession::new(store, client, settings), dir)
    }

    #[tokio::test]
    async fn test_send_persists_both_turns_with_metadata() {
        let backend = Arc::new(ScriptedBackend::replying("Paris."));
        let (mut session, _dir) = session_with(backend.clone());
        session.settings_mut().set_system_prompt(Some("Be brief.".into()));

        let outcome = session.send("  Capital of France?  ").await.unwrap();
        assert!(outcome.result.is_success());
        assert!(outcome.estimated_cost > 0.0);

        let conv = session.load_current().unwrap().unwrap();
        assert_eq!(conv.id, outcome.conversation_id);
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].role, Role::User);
        assert_eq!(conv.messages[0].content, "Capital of France?");
        assert!(conv.messages[0].metadata.is_empty());

        let reply = &conv.messages[1];
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "Paris.");
        assert_eq!(reply.metadata.model_used.as_deref(), Some("gpt-3.5-turbo"));
        assert_eq!(reply.metadata.tokens_used, Some(10));
        assert_eq!(reply.metadata.max_tokens, Some(1000));
        assert_eq!(reply.metadata.system_prompt_used, Some(true));
    }

    #[tokio::test]
    async fn test_failed_exchange_recorded_as_apology() {
        let backend = Arc::new(ScriptedBackend::repeating(Err(
            BackendError::Authentication("401".into()),
        )));
        let (mut session, _dir) = session_with(backend.clone());

        let outcome = session.send("hello").await.unwrap();
        assert!(!outcome.result.is_success());

        let conv = session.load_current().unwrap().unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(
            conv.messages[1].content,
            "I apologize, but I encountered an error: Invalid API key. Please check your configuration."
        );
        assert!(conv.messages[1].metadata.is_empty());
    }

    #[tokio::test]
    async fn test_send_rejects_blank_input_without_side_effects() {
        let backend = Arc::new(ScriptedBackend::replying("unused"));
        let (mut session, _dir) = session_with(backend.clone());

        assert!(session.send(" \u{1b} ").await.is_err());
        assert!(session.current_conversation().is_none());
        assert!(session.store().list_all().unwrap().is_empty());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_send_reuses_current_conversation() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let (mut session, _dir) = session_with(backend);

        let first = session.send("one").await.unwrap();
        let second = session.send("two").await.unwrap();
        assert_eq!(first.conversation_id, second.conversation_id);
        assert_eq!(session.store().list_all().unwrap().len(), 1);
        assert_eq!(session.load_current().unwrap().unwrap().messages.len(), 4);
    }

    #[test]
    fn test_switch_and_delete() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let (mut session, _dir) = session_with(backend);

        let a = session.new_conversation(Some("A")).unwrap();
        let b = session.new_conversation(Some("B")).unwrap();
        assert_eq!(session.current_conversation(), Some(b.as_str()));

        let conv = session.switch_to(&a).unwrap();
        assert_eq!(conv.title, "A");
        assert!(session.switch_to("missing").is_err());
        assert_eq!(session.current_conversation(), Some(a.as_str()));

        assert!(session.delete(&a).unwrap());
        assert!(session.current_conversation().is_none());
        assert!(!session.delete(&a).unwrap());
    }

    #[test]
    fn test_settings_from_config_drop_blank_system_prompt() {
        let config = ChatConfig {
            system_prompt: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(ChatSettings::from_config(&config).system_prompt.is_none());
    }

    #[test]
    fn test_format_response_time() {
        assert_eq!(format_response_time(0.25), "250ms");
        assert_eq!(format_response_time(1.0), "1.00s");
        assert_eq!(format_response_time(12.345), "12.35s");
    }

    #[test]
    fn test_format_response_time_rounds_before_switching_units() {
        assert_eq!(format_response_time(0.9996), "1.00s");
        assert_eq!(format_response_time(0.9994), "999ms");
        assert_eq!(format_response_time(0.0), "0ms");
    }

    #[test]
    fn test_sanitize_input_keeps_newlines_inside() {
        assert_eq!(sanitize_input("line one\nline two\r\n"), "line one\nline two");
    }
}
