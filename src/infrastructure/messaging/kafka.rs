//! Kafka Connector
//!
//! rdkafka-backed [`BrokerConnector`]. Every `connect_*` call creates a new
//! client, so each channel owns its own connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer as _, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{BorrowedMessage, Header, Headers as _, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer as _};
use rdkafka::util::Timeout;
use rdkafka::{Message as _, Offset, TopicPartitionList};
use tracing::{debug, info, instrument, warn};

use super::connector::{BrokerConnector, ConsumerClient, ProducerClient};
use super::record::{Message, OutgoingRecord, RecordMetadata, TopicPartition};
use crate::config::KafkaSettings;
use crate::shared::error::TransportError;

/// Connector creating rdkafka producers and stream consumers.
#[derive(Debug, Clone)]
pub struct KafkaConnector {
    settings: KafkaSettings,
    delivery_timeout: Duration,
}

impl KafkaConnector {
    pub fn new(settings: KafkaSettings, delivery_timeout: Duration) -> Self {
        Self {
            settings,
            delivery_timeout,
        }
    }

    fn base_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.settings.bootstrap_servers)
            .set("client.id", &self.settings.client_id);
        config
    }
}

#[async_trait]
impl BrokerConnector for KafkaConnector {
    #[instrument(skip(self), fields(brokers = %self.settings.bootstrap_servers))]
    async fn connect_producer(&self) -> Result<Arc<dyn ProducerClient>, TransportError> {
        let producer: FutureProducer = self
            .base_config()
            .set("message.timeout.ms", self.delivery_timeout.as_millis().to_string())
            .set("acks", "all")
            .create()?;

        info!("Kafka producer created");
        Ok(Arc::new(KafkaProducerClient {
            producer,
            delivery_timeout: self.delivery_timeout,
        }))
    }

    #[instrument(skip(self), fields(brokers = %self.settings.bootstrap_servers, group = %self.settings.group_id))]
    async fn connect_consumer(&self) -> Result<Arc<dyn ConsumerClient>, TransportError> {
        let consumer: StreamConsumer = self
            .base_config()
            .set("group.id", &self.settings.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.settings.auto_offset_reset)
            .set("session.timeout.ms", self.settings.session_timeout_ms.to_string())
            .set("enable.partition.eof", "false")
            .create()?;

        info!("Kafka consumer created");
        Ok(Arc::new(KafkaConsumerClient {
            consumer: Arc::new(consumer),
        }))
    }
}

struct KafkaProducerClient {
    producer: FutureProducer,
    delivery_timeout: Duration,
}

#[async_trait]
impl ProducerClient for KafkaProducerClient {
    async fn send(&self, record: OutgoingRecord) -> Result<RecordMetadata, TransportError> {
        let mut future = FutureRecord::<[u8], [u8]>::to(&record.topic);
        if let Some(key) = record.key.as_deref() {
            future = future.key(key);
        }
        if let Some(value) = record.value.as_deref() {
            future = future.payload(value);
        }
        if let Some(partition) = record.partition {
            future = future.partition(partition);
        }
        if let Some(timestamp) = record.timestamp {
            future = future.timestamp(timestamp);
        }
        if !record.headers.is_empty() {
            let headers = record
                .headers
                .iter()
                .fold(OwnedHeaders::new_with_capacity(record.headers.len()), |acc, (key, value)| {
                    acc.insert(Header {
                        key: key.as_str(),
                        value: Some(value.as_slice()),
                    })
                });
            future = future.headers(headers);
        }

        let (partition, offset) = self
            .producer
            .send(future, Timeout::After(self.delivery_timeout))
            .await
            .map_err(|(err, _)| TransportError::Broker(err))?;

        Ok(RecordMetadata::new(record.topic, partition, offset, record.timestamp))
    }

    async fn close(&self) -> Result<(), TransportError> {
        let producer = self.producer.clone();
        let timeout = self.delivery_timeout;
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|err| TransportError::Internal(err.to_string()))??;

        debug!("Kafka producer flushed");
        Ok(())
    }
}

struct KafkaConsumerClient {
    consumer: Arc<StreamConsumer>,
}

#[async_trait]
impl ConsumerClient for KafkaConsumerClient {
    fn subscribe(&self, topics: &[String]) -> Result<(), TransportError> {
        let topics: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer.subscribe(&topics)?;
        Ok(())
    }

    async fn fetch_one(&self) -> Result<Message, TransportError> {
        let message = self.consumer.recv().await?;
        Ok(to_message(&message))
    }

    async fn fetch_many(
        &self,
        max_records: usize,
        timeout: Duration,
    ) -> Result<Vec<Message>, TransportError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut records = Vec::with_capacity(max_records);

        while records.len() < max_records {
            match tokio::time::timeout_at(deadline, self.consumer.recv()).await {
                Err(_) => break,
                Ok(Ok(message)) => records.push(to_message(&message)),
                Ok(Err(err)) if records.is_empty() => return Err(err.into()),
                Ok(Err(err)) => {
                    warn!(error = %err, fetched = records.len(), "Fetch interrupted; returning partial batch");
                    break;
                }
            }
        }

        Ok(records)
    }

    async fn commit_all(&self) -> Result<(), TransportError> {
        let consumer = Arc::clone(&self.consumer);
        let committed = tokio::task::spawn_blocking(move || consumer.commit_consumer_state(CommitMode::Sync))
            .await
            .map_err(|err| TransportError::Internal(err.to_string()))?;

        match committed {
            Ok(()) => Ok(()),
            // nothing fetched since the last commit
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn commit(&self, offsets: &HashMap<TopicPartition, i64>) -> Result<(), TransportError> {
        let mut list = TopicPartitionList::with_capacity(offsets.len());
        for (tp, offset) in offsets {
            list.add_partition_offset(&tp.topic, tp.partition, Offset::Offset(*offset))?;
        }

        let consumer = Arc::clone(&self.consumer);
        tokio::task::spawn_blocking(move || consumer.commit(&list, CommitMode::Sync))
            .await
            .map_err(|err| TransportError::Internal(err.to_string()))??;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.consumer.unsubscribe();
        debug!("Kafka consumer unsubscribed");
        Ok(())
    }
}

fn to_message(message: &BorrowedMessage<'_>) -> Message {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|header| (header.key.to_owned(), header.value.map(<[u8]>::to_vec).unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default();

    Message {
        topic: message.topic().to_owned(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        value: message.payload().map(<[u8]>::to_vec),
        headers,
        timestamp: message.timestamp().to_millis(),
    }
}
