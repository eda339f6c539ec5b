//! Kafka to MongoDB Relay
//!
//! Persists chat messages consumed from the broker. Offsets are committed
//! only after every record of the batch was stored or skipped. Records that
//! are empty or not chat messages are skipped, so they cannot stall the
//! partition. A store failure aborts the consumer without committing, so the
//! batch is consumed again after the next `start` instead of being lost.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::relay::{RelayService, TickSummary};
use crate::domain::{MessageRepository, NewChatMessage};
use crate::infrastructure::messaging::{Consumer, JsonCodec, LifecycleState, Message, Transport};
use crate::infrastructure::metrics;
use crate::shared::error::RelayError;

const RELAY_NAME: &str = "kafka_to_mongo";

/// KafkaToMongo tuning.
#[derive(Debug, Clone)]
pub struct KafkaToMongoConfig {
    /// Source topic
    pub topic: String,
    /// Upper bound on records per tick
    pub max_records: usize,
    /// Time budget for filling a batch
    pub batch_timeout: Duration,
}

impl KafkaToMongoConfig {
    pub fn new(topic: impl Into<String>, max_records: usize, batch_timeout: Duration) -> Self {
        Self {
            topic: topic.into(),
            max_records,
            batch_timeout,
        }
    }
}

/// Relay moving broker records into the document store.
pub struct KafkaToMongo {
    transport: Arc<dyn Transport>,
    repository: Arc<dyn MessageRepository>,
    config: KafkaToMongoConfig,
    consumer: Option<Consumer>,
    codec: JsonCodec,
    state: LifecycleState,
}

impl KafkaToMongo {
    pub fn new(
        transport: Arc<dyn Transport>,
        repository: Arc<dyn MessageRepository>,
        config: KafkaToMongoConfig,
    ) -> Self {
        Self {
            transport,
            repository,
            config,
            consumer: None,
            codec: JsonCodec,
            state: LifecycleState::NotReady,
        }
    }

    fn decode(&self, message: &Message, value: &[u8]) -> Result<NewChatMessage, RelayError> {
        self.codec.decode(value).map_err(|source| RelayError::Decode {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            source,
        })
    }

    async fn persist_batch(&self, batch: &[Message], summary: &mut TickSummary) -> Result<(), RelayError> {
        for message in batch {
            let Some(value) = message.value.as_deref().filter(|value| !value.is_empty()) else {
                summary.skipped += 1;
                continue;
            };

            let document = match self.decode(message, value) {
                Ok(document) => document,
                Err(err) => {
                    warn!(error = %err, "Skipping record that is not a chat message");
                    summary.skipped += 1;
                    continue;
                }
            };
            let stored = self.repository.create(&document).await?;
            summary.handled += 1;
            debug!(
                id = %stored.id,
                partition = message.partition,
                offset = message.offset,
                "Chat message persisted"
            );
        }
        Ok(())
    }

    /// Drops the consumer without the commit a regular close performs, so
    /// the failed batch is fetched again after the next `start`.
    async fn abandon_consumer(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            if let Err(err) = consumer.abort().await {
                warn!(error = %err, "Consumer abort failed");
            }
        }
        self.state = LifecycleState::Closed;
    }
}

#[async_trait]
impl RelayService for KafkaToMongo {
    fn name(&self) -> &'static str {
        RELAY_NAME
    }

    async fn start(&mut self) -> Result<(), RelayError> {
        if self.state == LifecycleState::Ready {
            return Ok(());
        }

        let consumer = self.transport.create_consumer();
        consumer.subscribe([self.config.topic.as_str()]).await?;
        consumer.start().await?;
        self.consumer = Some(consumer);
        self.state = LifecycleState::Ready;
        info!(topic = %self.config.topic, "KafkaToMongo relay started");
        Ok(())
    }

    async fn stop(&mut self) {
        if self.state == LifecycleState::Closed {
            return;
        }

        if let Some(consumer) = self.consumer.take() {
            if let Err(err) = consumer.close().await {
                warn!(error = %err, "Consumer close failed");
            }
        }
        self.state = LifecycleState::Closed;
        info!("KafkaToMongo relay stopped");
    }

    #[instrument(skip(self), fields(topic = %self.config.topic))]
    async fn process(&mut self) -> Result<TickSummary, RelayError> {
        if self.state != LifecycleState::Ready {
            return Ok(TickSummary::default());
        }
        let Some(consumer) = self.consumer.as_ref() else {
            return Ok(TickSummary::default());
        };

        let started = Instant::now();
        let batch = consumer
            .consume_batch(self.config.max_records, self.config.batch_timeout)
            .await?;
        if batch.is_empty() {
            metrics::record_tick(RELAY_NAME, started.elapsed().as_secs_f64());
            return Ok(TickSummary::default());
        }

        let mut summary = TickSummary::default();
        if let Err(err) = self.persist_batch(&batch, &mut summary).await {
            warn!(
                persisted = summary.handled,
                batch = batch.len(),
                error = %err,
                "Batch persistence failed; offsets left uncommitted"
            );
            self.abandon_consumer().await;
            return Err(err);
        }
        metrics::record_persisted(summary.handled);

        if let Some(consumer) = self.consumer.as_ref() {
            if let Err(err) = consumer.commit().await {
                metrics::record_commit_failure();
                warn!(error = %err, "Offset commit failed; batch will be redelivered");
            }
        }

        metrics::record_relayed(RELAY_NAME, summary.handled);
        metrics::record_skipped(RELAY_NAME, summary.skipped);
        metrics::record_tick(RELAY_NAME, started.elapsed().as_secs_f64());
        Ok(summary)
    }

    fn state(&self) -> LifecycleState {
        self.state
    }
}
