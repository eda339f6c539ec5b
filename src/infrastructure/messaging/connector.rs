//! Broker Connectors
//!
//! Connection-factory seam between channels and a concrete broker client.
//! Each channel asks its connector for a fresh client on `start()` and owns
//! that client exclusively until `stop()`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::record::{Message, OutgoingRecord, RecordMetadata, TopicPartition};
use crate::shared::error::TransportError;

/// Publishing side of a broker connection.
#[async_trait]
pub trait ProducerClient: Send + Sync {
    /// Sends one serialized record and waits for the broker acknowledgement.
    async fn send(&self, record: OutgoingRecord) -> Result<RecordMetadata, TransportError>;

    /// Flushes in-flight sends and releases the connection.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Fetching side of a broker connection.
#[async_trait]
pub trait ConsumerClient: Send + Sync {
    fn subscribe(&self, topics: &[String]) -> Result<(), TransportError>;

    /// Waits for the next record.
    async fn fetch_one(&self) -> Result<Message, TransportError>;

    /// Fetches up to `max_records` within `timeout`, in delivery order.
    async fn fetch_many(
        &self,
        max_records: usize,
        timeout: Duration,
    ) -> Result<Vec<Message>, TransportError>;

    /// Commits the position after every record fetched so far.
    async fn commit_all(&self) -> Result<(), TransportError>;

    /// Commits exactly the given offsets.
    async fn commit(&self, offsets: &HashMap<TopicPartition, i64>) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Factory for broker connections.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect_producer(&self) -> Result<Arc<dyn ProducerClient>, TransportError>;

    async fn connect_consumer(&self) -> Result<Arc<dyn ConsumerClient>, TransportError>;
}
