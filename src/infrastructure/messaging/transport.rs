//! Transport
//!
//! Factory assembling producers and consumers over a broker connector.

use std::sync::Arc;

use super::channel::{BrokerConsumerChannel, BrokerProducerChannel};
use super::codec::{codec_by_name, CodecError};
use super::connector::BrokerConnector;
use super::consumer::{Consumer, ConsumerOptions};
use super::kafka::KafkaConnector;
use super::producer::{Producer, ProducerOptions};
use crate::config::Settings;

/// Creates fresh producer/consumer pairs. Implementations are swappable so
/// relays can be exercised without a broker.
pub trait Transport: Send + Sync {
    fn create_producer(&self) -> Producer;

    fn create_consumer(&self) -> Consumer;
}

/// Transport building channels from a [`BrokerConnector`].
#[derive(Clone)]
pub struct BrokerTransport {
    connector: Arc<dyn BrokerConnector>,
    producer_options: ProducerOptions,
    consumer_options: ConsumerOptions,
}

impl BrokerTransport {
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        producer_options: ProducerOptions,
        consumer_options: ConsumerOptions,
    ) -> Self {
        Self {
            connector,
            producer_options,
            consumer_options,
        }
    }

    /// Kafka-backed transport configured from settings.
    pub fn kafka(settings: &Settings) -> Result<Self, CodecError> {
        let connector = KafkaConnector::new(settings.kafka.clone(), settings.producer.publish_timeout());

        let producer_options = ProducerOptions {
            buffer_capacity: settings.producer.buffer_capacity,
            publish_timeout: settings.producer.ready_timeout(),
            key_codec: codec_by_name(&settings.kafka.key_codec)?,
            value_codec: codec_by_name(&settings.kafka.value_codec)?,
        };
        let consumer_options = ConsumerOptions {
            ready_timeout: settings.consumer.ready_timeout(),
        };

        Ok(Self::new(Arc::new(connector), producer_options, consumer_options))
    }
}

impl Transport for BrokerTransport {
    fn create_producer(&self) -> Producer {
        let channel = BrokerProducerChannel::new(Arc::clone(&self.connector));
        Producer::new(Arc::new(channel), &self.producer_options)
    }

    fn create_consumer(&self) -> Consumer {
        let channel = BrokerConsumerChannel::new(Arc::clone(&self.connector));
        Consumer::new(Arc::new(channel), &self.consumer_options)
    }
}
