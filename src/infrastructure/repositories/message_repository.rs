//! Message Repository Implementation
//!
//! MongoDB implementation of chat message persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{self, doc};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::MongoSettings;
use crate::domain::{MessageRepository, NewChatMessage, StoredChatMessage};
use crate::shared::error::RepositoryError;

/// MongoDB chat message repository.
#[derive(Clone)]
pub struct MongoMessageRepository {
    collection: Collection<MessageDocument>,
}

impl MongoMessageRepository {
    /// Creates a repository over an existing collection handle.
    pub fn new(client: &Client, database: &str, collection: &str) -> Self {
        Self {
            collection: client.database(database).collection(collection),
        }
    }

    /// Connects to MongoDB and opens the configured collection.
    #[instrument(skip(settings), fields(database = %settings.database, collection = %settings.collection))]
    pub async fn connect(settings: &MongoSettings) -> Result<Self, RepositoryError> {
        let client = Client::with_uri_str(&settings.url).await?;
        info!("MongoDB client created");
        Ok(Self::new(&client, &settings.database, &settings.collection))
    }
}

/// Stored document shape.
/// `_id` is assigned by the store on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,

    #[serde(flatten)]
    message: NewChatMessage,

    created_at: bson::DateTime,
}

impl MessageDocument {
    fn new(message: &NewChatMessage) -> Self {
        Self {
            id: None,
            message: message.clone(),
            created_at: bson::DateTime::now(),
        }
    }

    /// Converts the stored document to the domain record.
    fn into_stored(self) -> Result<StoredChatMessage, RepositoryError> {
        let id = self
            .id
            .ok_or_else(|| RepositoryError::InvalidDocument("document without _id".into()))?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(self.created_at.timestamp_millis())
            .ok_or_else(|| RepositoryError::InvalidDocument(format!("createdAt out of range on {}", id)))?;

        Ok(StoredChatMessage {
            id: id.to_hex(),
            message: self.message,
            created_at,
        })
    }
}

#[async_trait]
impl MessageRepository for MongoMessageRepository {
    #[instrument(skip(self, message), fields(conversation_id = %message.conversation_id), level = "debug")]
    async fn create(&self, message: &NewChatMessage) -> Result<StoredChatMessage, RepositoryError> {
        let inserted = self.collection.insert_one(MessageDocument::new(message)).await?;
        let id = inserted
            .inserted_id
            .as_object_id()
            .ok_or_else(|| RepositoryError::InvalidDocument(format!("unexpected _id {}", inserted.inserted_id)))?;

        let stored = self
            .collection
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_hex()))?;

        debug!(id = %id, "Chat message stored");
        stored.into_stored()
    }
}
