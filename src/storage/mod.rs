//! Conversation storage
//!
//! Each conversation lives in its own pretty-printed JSON file named
//! `<id>.json` inside the history directory. The store assumes a single
//! writer per conversation id; concurrent writers race and the last
//! rename wins.
//!
//! Missing or malformed records are reported as "not found". Real I/O
//! failures surface as [`ParleyError::Storage`].

use crate::config::StorageConfig;
use crate::error::{Result, ParleyError};
use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use directories::ProjectDirs;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use ulid::Ulid;

pub mod types;
pub use types::{Conversation, ConversationSummary, Message, MessageMetadata, Role};

/// Environment variable that overrides the history directory
pub const HISTORY_DIR_ENV: &str = "PARLEY_HISTORY_DIR";

const RECORD_EXTENSION: &str = "json";

/// Listing view of a record; messages are counted, not decoded.
#[derive(Deserialize)]
struct SummaryRecord {
    id: String,
    title: String,
    #[serde(deserialize_with = "types::deserialize_timestamp")]
    created_at: DateTime<Utc>,
    #[serde(deserialize_with = "types::deserialize_timestamp")]
    updated_at: DateTime<Utc>,
    #[serde(default)]
    messages: Vec<IgnoredAny>,
}

/// File-backed conversation store
pub struct ConversationStore {
    dir: PathBuf,
}

impl ConversationStore {
    /// Create a store in the default location
    ///
    /// Honors `PARLEY_HISTORY_DIR`, otherwise uses the platform data
    /// directory (e.g. `~/.local/share/parley/chat_history`).
    pub fn new() -> Result<Self> {
        if let Ok(override_dir) = std::env::var(HISTORY_DIR_ENV) {
            return Self::new_with_path(override_dir);
        }

        let proj_dirs = ProjectDirs::from("dev", "parley", "parley")
            .ok_or_else(|| ParleyError::Storage("Could not determine data directory".into()))?;

        Self::new_with_path(proj_dirs.data_dir().join("chat_history"))
    }

    /// Create a store from configuration, falling back to [`ConversationStore::new`]
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match &config.history_dir {
            Some(dir) => Self::new_with_path(dir),
            None => Self::new(),
        }
    }

    /// Create a store rooted at `dir`, creating the directory if needed
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::storage::ConversationStore;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = ConversationStore::new_with_path(dir.path().join("history")).unwrap();
    /// assert!(store.dir().exists());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create history directory {}", dir.display()))
            .map_err(|e| ParleyError::Storage(format!("{:#}", e)))?;

        tracing::debug!("Conversation store at {}", dir.display());
        Ok(Self { dir })
    }

    /// Directory holding the conversation records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create and persist an empty conversation, returning its id
    ///
    /// A missing or blank title is replaced by a generated one such as
    /// "Chat May 01 at 09:30 AM".
    pub fn create(&self, title: Option<&str>) -> Result<String> {
        let mut id = Ulid::new().to_string();
        while self.record_path(&id).exists() {
            id = Ulid::new().to_string();
        }

        let title = match title.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => auto_title(Local::now()),
        };

        let mut conversation = Conversation::new(id.clone(), title);
        self.save(&id, &mut conversation)?;

        tracing::info!("Created conversation {}", id);
        Ok(id)
    }

    /// Persist `conversation` under `id`, refreshing its `updated_at`
    ///
    /// The record is written to a temporary file in the history directory
    /// and renamed over the target.
    pub fn save(&self, id: &str, conversation: &mut Conversation) -> Result<()> {
        if !is_valid_id(id) {
            return Err(ParleyError::Storage(format!("Invalid conversation id: {:?}", id)).into());
        }

        conversation.id = id.to_string();
        conversation.updated_at = Utc::now().max(conversation.created_at);

        let mut tmp = NamedTempFile::new_in(&self.dir)
            .context("Failed to create temporary record")
            .map_err(|e| ParleyError::Storage(format!("{:#}", e)))?;

        serde_json::to_writer_pretty(&mut tmp, conversation)
            .context("Failed to serialize conversation")
            .map_err(|e| ParleyError::Storage(format!("{:#}", e)))?;

        tmp.write_all(b"\n")
            .and_then(|_| tmp.as_file().sync_all())
            .context("Failed to write conversation record")
            .map_err(|e| ParleyError::Storage(format!("{:#}", e)))?;

        tmp.persist(self.record_path(id))
            .map_err(|e| ParleyError::Storage(format!("Failed to persist conversation {}: {}", id, e.error)))?;

        tracing::debug!(
            "Saved conversation {} ({} messages)",
            id,
            conversation.messages.len()
        );
        Ok(())
    }

    /// Load a conversation by id
    ///
    /// Returns `Ok(None)` when the record is absent, the id is not a valid
    /// record name, or the stored content does not parse.
    pub fn load(&self, id: &str) -> Result<Option<Conversation>> {
        if !is_valid_id(id) {
            tracing::debug!("Rejected conversation id {:?}", id);
            return Ok(None);
        }

        let path = self.record_path(id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ParleyError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                ))
                .into())
            }
        };

        match serde_json::from_slice::<Conversation>(&bytes) {
            Ok(conversation) => Ok(Some(conversation)),
            Err(e) => {
                tracing::warn!("Ignoring malformed record {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// List every stored conversation, most recently updated first
    ///
    /// Files that cannot be read or parsed are skipped.
    pub fn list_all(&self) -> Result<Vec<ConversationSummary>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ParleyError::Storage(format!(
                    "Failed to list {}: {}",
                    self.dir.display(),
                    e
                ))
                .into())
            }
        };

        let mut summaries: Vec<ConversationSummary> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXTENSION)
            })
            .filter_map(|path| read_summary(&path))
            .collect();

        summaries.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(summaries)
    }

    /// The `limit` most recently updated conversations
    pub fn list_recent(&self, limit: usize) -> Result<Vec<ConversationSummary>> {
        let mut summaries = self.list_all()?;
        summaries.truncate(limit);
        Ok(summaries)
    }

    /// Append a message to an existing conversation and persist it
    ///
    /// Returns `Ok(false)` without creating anything when the conversation
    /// does not exist.
    pub fn append_message(
        &self,
        id: &str,
        role: Role,
        content: &str,
        metadata: Option<MessageMetadata>,
    ) -> Result<bool> {
        let Some(mut conversation) = self.load(id)? else {
            tracing::warn!("Cannot append to missing conversation {}", id);
            return Ok(false);
        };

        conversation
            .messages
            .push(Message::new(role, content, metadata));
        self.save(id, &mut conversation)?;
        Ok(true)
    }

    /// Delete a conversation record
    ///
    /// Returns whether a record was removed; deleting an unknown id is not
    /// an error.
    pub fn delete(&self, id: &str) -> Result<bool> {
        if !is_valid_id(id) {
            return Ok(false);
        }

        let path = self.record_path(id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Deleted conversation {}", id);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ParleyError::Storage(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))
            .into()),
        }
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, RECORD_EXTENSION))
    }
}

fn read_summary(path: &Path) -> Option<ConversationSummary> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Skipping unreadable record {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_slice::<SummaryRecord>(&bytes) {
        Ok(record) => Some(ConversationSummary {
            id: record.id,
            title: record.title,
            created_at: record.created_at,
            updated_at: record.updated_at,
            message_count: record.messages.len(),
        }),
        Err(e) => {
            tracing::warn!("Skipping malformed record {}: {}", path.display(), e);
            None
        }
    }
}

/// Ids double as file stems, so only a conservative alphabet is accepted.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Generated conversation title, e.g. "Chat May 01 at 09:30 AM"
pub fn auto_title(now: DateTime<Local>) -> String {
    format!("Chat {}", now.format("%B %d at %I:%M %p"))
}
