//! Producer and Consumer Channels
//!
//! Thin, readiness-gated wrappers around a broker client obtained from a
//! [`BrokerConnector`].
//!
//! The producer channel never returns publish failures to its caller: every
//! outcome, including "not ready" and "closed", is delivered through the
//! message's [`FutureMessage`]. The consumer channel reports failures
//! directly because fetch and commit are not per-message operations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::connector::{BrokerConnector, ConsumerClient, ProducerClient};
use super::future::FutureMessage;
use super::lifecycle::{Lifecycle, LifecycleState, Readiness};
use super::record::{Message, TopicPartition};
use crate::shared::error::TransportError;

/// Publishing channel.
#[async_trait]
pub trait ProducerChannel: Lifecycle {
    /// Publishes the message and resolves its future with the outcome.
    ///
    /// Waits at most `timeout` for readiness. Never fails to the caller.
    async fn publish(&self, future: FutureMessage, timeout: Duration);
}

/// Fetching channel.
#[async_trait]
pub trait ConsumerChannel: Lifecycle {
    /// Fetches a single record, waiting at most `timeout`.
    async fn consume(&self, timeout: Duration) -> Result<Message, TransportError>;

    /// Fetches up to `max_records` within `timeout`, grouped by partition in
    /// broker order. May return an empty batch.
    async fn consume_batch(
        &self,
        max_records: usize,
        timeout: Duration,
    ) -> Result<Vec<Message>, TransportError>;

    /// Records topic interest. Must precede consumption.
    async fn subscribe(&self, topics: &[String]) -> Result<(), TransportError>;

    /// Commits offsets. An empty map commits every fetched position; a
    /// non-empty map commits exactly the given offsets. No-op when closed.
    async fn commit_offsets(&self, offsets: &HashMap<TopicPartition, i64>) -> Result<(), TransportError>;
}

/// Producer channel backed by a connector-provided client.
pub struct BrokerProducerChannel {
    connector: Arc<dyn BrokerConnector>,
    client: Mutex<Option<Arc<dyn ProducerClient>>>,
    readiness: Readiness,
}

impl BrokerProducerChannel {
    pub fn new(connector: Arc<dyn BrokerConnector>) -> Self {
        Self {
            connector,
            client: Mutex::new(None),
            readiness: Readiness::new(),
        }
    }

    async fn current_client(&self) -> Option<Arc<dyn ProducerClient>> {
        self.client.lock().await.clone()
    }
}

#[async_trait]
impl Lifecycle for BrokerProducerChannel {
    async fn start(&self) -> Result<(), TransportError> {
        let mut slot = self.client.lock().await;
        if self.readiness.state() == LifecycleState::Ready {
            return Ok(());
        }

        *slot = Some(self.connector.connect_producer().await?);
        self.readiness.set_ready();
        info!("Producer channel ready");
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let mut slot = self.client.lock().await;
        if self.readiness.state() == LifecycleState::Closed {
            return Ok(());
        }

        self.readiness.set_closed();
        let client = slot.take();
        drop(slot);

        if let Some(client) = client {
            client.close().await?;
        }
        info!("Producer channel closed");
        Ok(())
    }

    fn state(&self) -> LifecycleState {
        self.readiness.state()
    }
}

#[async_trait]
impl ProducerChannel for BrokerProducerChannel {
    async fn publish(&self, future: FutureMessage, timeout: Duration) {
        if let Err(err) = self.readiness.wait(timeout).await {
            future.set_error(err);
            return;
        }

        let Some(client) = self.current_client().await else {
            future.set_error(TransportError::Closed);
            return;
        };

        let record = match future.message().encode() {
            Ok(record) => record,
            Err(err) => {
                future.set_error(err.into());
                return;
            }
        };

        match client.send(record).await {
            Ok(metadata) => {
                debug!(
                    topic = %metadata.topic,
                    partition = metadata.partition,
                    offset = metadata.offset,
                    "Message published"
                );
                future.set_result(metadata);
            }
            Err(err) => {
                warn!(topic = %future.message().topic(), error = %err, "Publish failed");
                future.set_error(err);
            }
        }
    }
}

/// Consumer channel backed by a connector-provided client.
pub struct BrokerConsumerChannel {
    connector: Arc<dyn BrokerConnector>,
    client: Mutex<Option<Arc<dyn ConsumerClient>>>,
    topics: parking_lot::Mutex<Vec<String>>,
    readiness: Readiness,
}

impl BrokerConsumerChannel {
    pub fn new(connector: Arc<dyn BrokerConnector>) -> Self {
        Self {
            connector,
            client: Mutex::new(None),
            topics: parking_lot::Mutex::new(Vec::new()),
            readiness: Readiness::new(),
        }
    }

    async fn ready_client(&self, deadline: Instant, timeout: Duration) -> Result<Arc<dyn ConsumerClient>, TransportError> {
        self.readiness.wait_until(deadline, timeout).await?;
        self.client.lock().await.clone().ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl Lifecycle for BrokerConsumerChannel {
    async fn start(&self) -> Result<(), TransportError> {
        let mut slot = self.client.lock().await;
        if self.readiness.state() == LifecycleState::Ready {
            return Ok(());
        }

        let client = self.connector.connect_consumer().await?;
        let topics = self.topics.lock().clone();
        if !topics.is_empty() {
            client.subscribe(&topics)?;
        }

        *slot = Some(client);
        self.readiness.set_ready();
        info!(topics = ?topics, "Consumer channel ready");
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let mut slot = self.client.lock().await;
        if self.readiness.state() == LifecycleState::Closed {
            return Ok(());
        }

        self.readiness.set_closed();
        let client = slot.take();
        drop(slot);

        if let Some(client) = client {
            client.close().await?;
        }
        info!("Consumer channel closed");
        Ok(())
    }

    fn state(&self) -> LifecycleState {
        self.readiness.state()
    }
}

#[async_trait]
impl ConsumerChannel for BrokerConsumerChannel {
    async fn consume(&self, timeout: Duration) -> Result<Message, TransportError> {
        // one deadline covers both the readiness wait and the fetch
        let deadline = Instant::now() + timeout;
        let client = self.ready_client(deadline, timeout).await?;
        tokio::time::timeout_at(deadline, client.fetch_one())
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }

    #[instrument(skip(self), level = "debug")]
    async fn consume_batch(
        &self,
        max_records: usize,
        timeout: Duration,
    ) -> Result<Vec<Message>, TransportError> {
        if max_records == 0 {
            return Ok(Vec::new());
        }

        let deadline = Instant::now() + timeout;
        let client = self.ready_client(deadline, timeout).await?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        let records = client.fetch_many(max_records, remaining).await?;
        debug!(count = records.len(), "Fetched batch");
        Ok(group_by_partition(records))
    }

    async fn subscribe(&self, topics: &[String]) -> Result<(), TransportError> {
        *self.topics.lock() = topics.to_vec();

        if let Some(client) = self.client.lock().await.as_ref() {
            client.subscribe(topics)?;
        }
        Ok(())
    }

    async fn commit_offsets(&self, offsets: &HashMap<TopicPartition, i64>) -> Result<(), TransportError> {
        let client = match self.readiness.state() {
            LifecycleState::Closed => return Ok(()),
            LifecycleState::NotReady => return Err(TransportError::NotReady),
            LifecycleState::Ready => match self.client.lock().await.clone() {
                Some(client) => client,
                None => return Ok(()),
            },
        };

        if offsets.is_empty() {
            client.commit_all().await
        } else {
            client.commit(offsets).await
        }
    }
}

/// Flattens records partition by partition, keeping the order in which
/// partitions first appeared and the broker order within each partition.
fn group_by_partition(records: Vec<Message>) -> Vec<Message> {
    let mut order: Vec<TopicPartition> = Vec::new();
    let mut groups: HashMap<TopicPartition, Vec<Message>> = HashMap::new();

    for record in records {
        let tp = record.tp();
        if !groups.contains_key(&tp) {
            order.push(tp.clone());
        }
        groups.entry(tp).or_default().push(record);
    }

    order
        .into_iter()
        .flat_map(|tp| groups.remove(&tp).unwrap_or_default())
        .collect()
}
