//! Redis to Kafka Relay
//!
//! Drains the Redis outbox into the broker.
//!
//! Each tick scans one page of outbox keys, reads a bounded prefix of every
//! list and publishes the entries keyed by conversation. Entries leave the
//! outbox only once the broker acknowledged them: the relay trims the longest
//! acknowledged prefix of each list and leaves the rest for a later sweep.
//! Delivery is therefore at-least-once.
//!
//! Entries are re-encoded as chat messages, so a numeric `conversationId`
//! leaves as a string. Entries that are not chat messages are dropped.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::relay::{relay_headers, RelayService, TickSummary};
use crate::domain::{Cursor, NewChatMessage};
use crate::infrastructure::cache::{keys, OutboxQueue};
use crate::infrastructure::messaging::{
    DeliveryFuture, Headers, LifecycleState, Producer, ProducerRecord, Transport,
};
use crate::infrastructure::metrics;
use crate::shared::error::{RelayError, TransportError};

const RELAY_NAME: &str = "redis_to_kafka";

/// RedisToKafka tuning.
#[derive(Debug, Clone)]
pub struct RedisToKafkaConfig {
    /// Destination topic
    pub topic: String,
    /// Keys requested per scan page
    pub scan_count: usize,
    /// Entries read per key and tick
    pub batch_size: usize,
    pub headers: Headers,
}

impl RedisToKafkaConfig {
    pub fn new(topic: impl Into<String>, scan_count: usize, batch_size: usize) -> Self {
        Self {
            topic: topic.into(),
            scan_count,
            batch_size,
            headers: relay_headers("redis", "redis-to-kafka"),
        }
    }
}

/// Outbox entries of one key awaiting their publish outcome, in list order.
/// `None` marks an entry that could not be parsed.
struct KeyBatch {
    key: String,
    deliveries: Vec<Option<DeliveryFuture>>,
}

/// Relay moving outbox entries to the broker.
pub struct RedisToKafka {
    transport: Arc<dyn Transport>,
    outbox: Arc<dyn OutboxQueue>,
    config: RedisToKafkaConfig,
    producer: Option<Producer>,
    cursor: Cursor,
    state: LifecycleState,
}

impl RedisToKafka {
    pub fn new(transport: Arc<dyn Transport>, outbox: Arc<dyn OutboxQueue>, config: RedisToKafkaConfig) -> Self {
        Self {
            transport,
            outbox,
            config,
            producer: None,
            cursor: Cursor::Start,
            state: LifecycleState::NotReady,
        }
    }

    /// Position of the key sweep.
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Reads and publishes the entries of one key.
    async fn publish_key(&self, producer: &Producer, key: String) -> Result<KeyBatch, RelayError> {
        let entries = self.outbox.peek(&key, self.config.batch_size).await?;
        let mut deliveries = Vec::with_capacity(entries.len());

        for entry in entries {
            let message: NewChatMessage = match serde_json::from_str(&entry) {
                Ok(message) => message,
                Err(err) => {
                    warn!(key = %key, error = %err, "Dropping malformed outbox entry");
                    deliveries.push(None);
                    continue;
                }
            };
            let value = serde_json::to_value(&message).map_err(|err| TransportError::Codec(err.into()))?;

            let mut record = ProducerRecord::new(&self.config.topic)
                .value(value)
                .headers(self.config.headers.clone());
            if let Some(conversation) = conversation_key(&message, &key) {
                record = record.key(conversation);
            }

            // keep headroom so a large tick never trips the buffer bound
            if producer.buffered() >= producer.buffer_capacity() {
                producer.flush().await?;
            }
            deliveries.push(Some(producer.send(record)?));
        }

        Ok(KeyBatch { key, deliveries })
    }

    /// Awaits the outcomes of one key and trims its acknowledged prefix.
    async fn settle_key(&self, batch: KeyBatch, summary: &mut TickSummary) -> Result<(), RelayError> {
        let mut acknowledged = 0;
        let mut blocked = false;

        for delivery in batch.deliveries {
            let Some(delivery) = delivery else {
                summary.skipped += 1;
                if !blocked {
                    acknowledged += 1;
                }
                continue;
            };

            match delivery.await {
                Ok(metadata) => {
                    summary.handled += 1;
                    if !blocked {
                        acknowledged += 1;
                    }
                    debug!(key = %batch.key, partition = metadata.partition, offset = metadata.offset, "Outbox entry relayed");
                }
                Err(err) => {
                    summary.failed += 1;
                    blocked = true;
                    metrics::record_publish_failure(&self.config.topic);
                    warn!(key = %batch.key, error = %err, "Publish failed; entry stays in outbox");
                }
            }
        }

        self.outbox.trim(&batch.key, acknowledged).await?;
        Ok(())
    }
}

#[async_trait]
impl RelayService for RedisToKafka {
    fn name(&self) -> &'static str {
        RELAY_NAME
    }

    async fn start(&mut self) -> Result<(), RelayError> {
        if self.state == LifecycleState::Ready {
            return Ok(());
        }

        let producer = self.transport.create_producer();
        producer.start().await?;
        self.producer = Some(producer);
        self.state = LifecycleState::Ready;
        info!(topic = %self.config.topic, "RedisToKafka relay started");
        Ok(())
    }

    async fn stop(&mut self) {
        if self.state == LifecycleState::Closed {
            return;
        }

        if let Some(producer) = self.producer.take() {
            if let Err(err) = producer.close().await {
                warn!(error = %err, "Producer close failed");
            }
        }
        self.state = LifecycleState::Closed;
        info!("RedisToKafka relay stopped");
    }

    #[instrument(skip(self), fields(cursor = self.cursor.token()))]
    async fn process(&mut self) -> Result<TickSummary, RelayError> {
        if self.state != LifecycleState::Ready {
            return Ok(TickSummary::default());
        }
        let Some(producer) = self.producer.as_ref() else {
            return Ok(TickSummary::default());
        };

        let started = Instant::now();
        let page = self
            .outbox
            .scan(self.cursor.advance(), self.config.scan_count)
            .await?;
        if page.keys.is_empty() {
            // filtered pages can be empty mid-sweep; only a finished sweep rewinds
            self.cursor = match page.next {
                Cursor::Resume(token) => Cursor::Resume(token),
                _ => Cursor::Start,
            };
            metrics::record_tick(RELAY_NAME, started.elapsed().as_secs_f64());
            return Ok(TickSummary::default());
        }
        let next = page.next;

        let mut batches = Vec::with_capacity(page.keys.len());
        for key in page.keys {
            match self.publish_key(producer, key).await {
                Ok(batch) => batches.push(batch),
                Err(err) => {
                    // nothing queued this tick will be trimmed, so it must not go out
                    let discarded = producer.discard();
                    warn!(discarded, error = %err, "RedisToKafka tick aborted");
                    return Err(err);
                }
            }
        }
        producer.flush().await?;

        let mut summary = TickSummary::default();
        for batch in batches {
            self.settle_key(batch, &mut summary).await?;
        }

        self.cursor = next;
        metrics::record_relayed(RELAY_NAME, summary.handled);
        metrics::record_skipped(RELAY_NAME, summary.skipped);
        metrics::record_tick(RELAY_NAME, started.elapsed().as_secs_f64());
        debug!(
            handled = summary.handled,
            failed = summary.failed,
            skipped = summary.skipped,
            sweep_complete = next.is_sweep_complete(),
            "RedisToKafka tick finished"
        );
        Ok(summary)
    }

    fn state(&self) -> LifecycleState {
        self.state
    }
}

/// Partition key of an entry: its conversation id, else the id segment of
/// the outbox key.
fn conversation_key(message: &NewChatMessage, key: &str) -> Option<String> {
    if message.conversation_id.is_empty() {
        keys::conversation_id(key).map(str::to_owned)
    } else {
        Some(message.conversation_id.clone())
    }
}
