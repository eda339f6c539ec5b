//! Record Types
//!
//! Shapes exchanged with the broker: outgoing records, publish confirmations
//! and consumed messages.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::codec::{self, CodecError, CodecRef, Payload};

/// Ordered `(name, value)` pairs carried alongside a record.
pub type Headers = Vec<(String, Vec<u8>)>;

/// The unit of offset tracking and ordering on the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.topic, self.partition)
    }
}

/// Confirmation of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: i32,
    pub topic_partition: TopicPartition,
    pub offset: i64,
    pub timestamp: Option<i64>,
}

impl RecordMetadata {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, timestamp: Option<i64>) -> Self {
        let topic = topic.into();
        Self {
            topic_partition: TopicPartition::new(topic.clone(), partition),
            topic,
            partition,
            offset,
            timestamp,
        }
    }
}

/// A record fetched from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: Headers,
    pub timestamp: Option<i64>,
}

impl Message {
    /// Topic-partition this record was read from.
    pub fn tp(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}

/// Caller-facing description of a record to publish.
///
/// Codecs left unset fall back to the producer defaults when the record is
/// turned into a [`PendingMessage`].
#[derive(Debug, Clone)]
pub struct ProducerRecord {
    pub topic: String,
    pub key: Option<Payload>,
    pub value: Option<Payload>,
    pub partition: Option<i32>,
    pub timestamp: Option<i64>,
    pub headers: Headers,
    pub key_codec: Option<CodecRef>,
    pub value_codec: Option<CodecRef>,
}

impl ProducerRecord {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            value: None,
            partition: None,
            timestamp: None,
            headers: Vec::new(),
            key_codec: None,
            value_codec: None,
        }
    }

    pub fn key(mut self, key: impl Into<Payload>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn value(mut self, value: impl Into<Payload>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp = Some(timestamp_ms);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn key_codec(mut self, codec: CodecRef) -> Self {
        self.key_codec = Some(codec);
        self
    }

    pub fn value_codec(mut self, codec: CodecRef) -> Self {
        self.value_codec = Some(codec);
        self
    }
}

/// A record accepted by a producer and waiting in its buffer.
///
/// Fields are only readable: once enqueued the message is not changed.
#[derive(Debug, Clone)]
pub struct PendingMessage {
    topic: String,
    key: Option<Payload>,
    value: Option<Payload>,
    partition: Option<i32>,
    timestamp: Option<i64>,
    headers: Headers,
    key_codec: CodecRef,
    value_codec: CodecRef,
}

impl PendingMessage {
    /// Resolves the record's codecs against the producer defaults.
    pub fn from_record(record: ProducerRecord, key_codec: &CodecRef, value_codec: &CodecRef) -> Self {
        Self {
            topic: record.topic,
            key: record.key,
            value: record.value,
            partition: record.partition,
            timestamp: record.timestamp,
            headers: record.headers,
            key_codec: record.key_codec.unwrap_or_else(|| key_codec.clone()),
            value_codec: record.value_codec.unwrap_or_else(|| value_codec.clone()),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn key(&self) -> Option<&Payload> {
        self.key.as_ref()
    }

    pub fn value(&self) -> Option<&Payload> {
        self.value.as_ref()
    }

    pub fn partition(&self) -> Option<i32> {
        self.partition
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Serializes key and value into the wire form handed to a broker client.
    pub fn encode(&self) -> Result<OutgoingRecord, CodecError> {
        Ok(OutgoingRecord {
            topic: self.topic.clone(),
            key: codec::serialize(self.key.as_ref(), self.key_codec.as_ref())?,
            value: codec::serialize(self.value.as_ref(), self.value_codec.as_ref())?,
            partition: self.partition,
            timestamp: self.timestamp,
            headers: self.headers.clone(),
        })
    }
}

/// A fully serialized record, ready for the broker client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRecord {
    pub topic: String,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub partition: Option<i32>,
    pub timestamp: Option<i64>,
    pub headers: Headers,
}
