use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Author of a message within a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that shape assistant behavior
    System,
    /// Text typed by the user
    User,
    /// Text produced by the model (or an apology for a failed call)
    Assistant,
}

impl Role {
    /// Wire name of the role, as used in records and API requests
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response details attached to an assistant message
///
/// Every field is optional; a message without details serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Human-readable response time (e.g. "850ms", "1.42s")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<String>,
    /// Model that actually served the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    /// Total tokens reported by the remote side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    /// Locally estimated cost in dollars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    /// Temperature requested for the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Max tokens requested for the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether a system prompt was sent with the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_used: Option<bool>,
}

impl MessageMetadata {
    /// True when no detail is present
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message
    pub role: Role,
    /// Message text
    pub content: String,
    /// When the message was appended
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Optional response details
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(role: Role, content: impl Into<String>, metadata: Option<MessageMetadata>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: metadata.unwrap_or_default(),
        }
    }
}

/// A titled, ordered collection of messages persisted as one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier, also the record's file stem
    pub id: String,
    /// User-supplied or generated title
    pub title: String,
    /// When the conversation was created
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    /// When the record was last persisted
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub updated_at: DateTime<Utc>,
    /// Messages in insertion (chronological) order
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Build an empty conversation created now
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }
}

/// Metadata for a stored conversation, used for listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Unique identifier for the conversation
    pub id: String,
    /// User-friendly title
    pub title: String,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// When the conversation was last updated
    pub updated_at: DateTime<Utc>,
    /// Number of messages in the conversation
    pub message_count: usize,
}

impl ConversationSummary {
    /// Title shortened for narrow displays (`max` chars plus "...")
    pub fn display_title(&self, max: usize) -> String {
        if self.title.chars().count() > max {
            let head: String = self.title.chars().take(max).collect();
            format!("{}...", head)
        } else {
            self.title.clone()
        }
    }
}

/// Parse an RFC 3339 timestamp, or an ISO-8601 one without an offset
///
/// Offset-less timestamps (`2024-01-01T12:00:00.123456`) are read as local
/// time, which is how older history files were written.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    let utc = match Local.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Skipped by a DST transition
        None => Utc.from_utc_datetime(&naive),
    };
    Some(utc)
}

pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
}
