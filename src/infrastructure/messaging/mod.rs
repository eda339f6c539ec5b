//! Messaging Module
//!
//! Broker transport used by the relays: codecs, lifecycle-gated channels,
//! the producer buffer and the producer/consumer wrappers built on them.
//!
//! # Architecture
//!
//! ```text
//! +-------------------+        +-------------------+
//! |     Producer      |        |     Consumer      |
//! +-------------------+        +-------------------+
//!          |                            |
//!          v                            |
//! +-------------------+                 |
//! |  ProducerBuffer   |  <-- bounded    |
//! +-------------------+                 |
//!          |                            |
//!          v                            v
//! +-------------------+        +-------------------+
//! |  ProducerChannel  |        |  ConsumerChannel  |  <-- readiness gated
//! +-------------------+        +-------------------+
//!          |                            |
//!          +-------------+--------------+
//!                        v
//!              +-------------------+
//!              |  BrokerConnector  |  <-- rdkafka or a test fake
//!              +-------------------+
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use chat_relay::infrastructure::messaging::{BrokerTransport, ProducerRecord, Transport};
//!
//! let transport = BrokerTransport::kafka(&settings)?;
//! let producer = transport.create_producer();
//! producer.start().await?;
//!
//! let delivery = producer.send(ProducerRecord::new("chat-messages").key("42").value(body))?;
//! producer.flush().await?;
//! let metadata = delivery.await?;
//! ```

mod buffer;
mod channel;
mod codec;
mod connector;
mod consumer;
mod future;
mod kafka;
mod lifecycle;
mod producer;
mod record;
mod transport;

pub use buffer::{ProducerBuffer, DEFAULT_BUFFER_CAPACITY};
pub use channel::{BrokerConsumerChannel, BrokerProducerChannel, ConsumerChannel, ProducerChannel};
pub use codec::{codec_by_name, serialize, Codec, CodecError, CodecRef, JsonCodec, Payload, RawCodec};
pub use connector::{BrokerConnector, ConsumerClient, ProducerClient};
pub use consumer::{Consumer, ConsumerOptions};
pub use future::{DeliveryFuture, DeliveryResult, FutureMessage};
pub use kafka::KafkaConnector;
pub use lifecycle::{Lifecycle, LifecycleState, Readiness};
pub use producer::{Producer, ProducerOptions};
pub use record::{
    Headers, Message, OutgoingRecord, PendingMessage, ProducerRecord, RecordMetadata, TopicPartition,
};
pub use transport::{BrokerTransport, Transport};
