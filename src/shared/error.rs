//! Error Types
//!
//! Centralized error handling for the transport and relay layers.
//!
//! Errors are grouped by the boundary that produces them:
//! - `TransportError` for broker channels, buffers and wrappers
//! - `OutboxError` for the Redis outbox queue
//! - `RepositoryError` for the document store
//! - `RelayError` at the relay service boundary, where the others meet

use std::time::Duration;

use rdkafka::error::KafkaError;

use crate::infrastructure::messaging::CodecError;

/// Errors raised by broker channels and the producer/consumer wrappers.
///
/// On the producer side these travel through the per-message delivery
/// future instead of being returned from `publish`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Component not ready")]
    NotReady,

    #[error("Component is closed")]
    Closed,

    #[error("Timed out after {0:?} waiting for readiness")]
    Timeout(Duration),

    #[error("Consumer not subscribed")]
    NotSubscribed,

    #[error("Producer buffer is full (capacity {capacity})")]
    BufferFull { capacity: usize },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Broker error: {0}")]
    Broker(#[from] KafkaError),

    #[error("Delivery abandoned before resolution")]
    Abandoned,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised by the outbox queue.
#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Errors raised by the document store.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

/// Errors surfaced by a relay tick to the job runner.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Outbox error: {0}")]
    Outbox(#[from] OutboxError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("Failed to decode record {topic}[{partition}]@{offset}: {source}")]
    Decode {
        topic: String,
        partition: i32,
        offset: i64,
        #[source]
        source: CodecError,
    },
}
