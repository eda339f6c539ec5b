//! Chat message document and repository trait.
//!
//! Shape of the chat messages relayed through the outbox and the broker,
//! and of the record the document store hands back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::shared::error::RepositoryError;

/// Source tag recorded when the writer did not supply one.
pub const DEFAULT_SOURCE: &str = "outbox";

/// Kind of file attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentType {
    Image,
    Video,
    File,
}

impl AttachmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::File => "file",
        }
    }
}

/// File attached to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "type")]
    pub attachment_type: AttachmentType,

    /// Storage identifier of the uploaded file
    pub file_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    /// Size in bytes
    pub size: i64,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Body of a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    /// Free-form content kind ("text", "image", ...)
    #[serde(rename = "type")]
    pub content_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl MessageContent {
    /// Plain text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".into(),
            text: Some(text.into()),
            attachments: Vec::new(),
        }
    }
}

/// A chat message as written to the outbox and carried on the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatMessage {
    pub author_id: i64,
    #[serde(deserialize_with = "conversation_id")]
    pub conversation_id: String,
    pub content: MessageContent,
    #[serde(default = "default_source")]
    pub source: String,
}

/// Writers send conversation ids as strings or as integers.
fn conversation_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_owned()
}

impl NewChatMessage {
    pub fn new(author_id: i64, conversation_id: impl Into<String>, content: MessageContent) -> Self {
        Self {
            author_id,
            conversation_id: conversation_id.into(),
            content,
            source: default_source(),
        }
    }
}

/// A chat message after it has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredChatMessage {
    /// Store-assigned identifier (hex ObjectId)
    pub id: String,

    #[serde(flatten)]
    pub message: NewChatMessage,

    pub created_at: DateTime<Utc>,
}

/// Repository trait for chat message persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persist a message and return the stored record.
    async fn create(&self, message: &NewChatMessage) -> Result<StoredChatMessage, RepositoryError>;
}
