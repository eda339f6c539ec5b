//! Common Test Utilities
//!
//! In-memory stand-ins for the broker, the Redis outbox and the document
//! store, so transport and relay behavior can be exercised without
//! external services.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use chat_relay::domain::{Cursor, MessageContent, MessageRepository, NewChatMessage, StoredChatMessage};
use chat_relay::infrastructure::cache::{OutboxQueue, ScanPage};
use chat_relay::infrastructure::messaging::{
    BrokerConnector, BrokerTransport, ConsumerClient, ConsumerOptions, Message, OutgoingRecord, ProducerClient,
    ProducerOptions, RecordMetadata, TopicPartition,
};
use chat_relay::shared::error::{OutboxError, RepositoryError, TransportError};

pub const TOPIC: &str = "chat-messages";

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BrokerState {
    /// Every record written to the broker, in append order
    log: Vec<Message>,
    next_offsets: HashMap<TopicPartition, i64>,
    /// Group offsets: position of the next record to deliver
    committed: HashMap<TopicPartition, i64>,
    commit_calls: usize,
}

impl BrokerState {
    fn append(&mut self, mut message: Message) -> i64 {
        let next = self.next_offsets.entry(message.tp()).or_insert(0);
        message.offset = *next;
        *next += 1;
        let offset = message.offset;
        self.log.push(message);
        offset
    }
}

#[derive(Default)]
struct BrokerInner {
    state: Mutex<BrokerState>,
    failing_keys: Mutex<HashSet<Vec<u8>>>,
}

/// In-memory broker implementing the connector seam. Consumers of the
/// single group start from the committed offsets, so records fetched but
/// never committed are delivered again to the next consumer.
#[derive(Default)]
pub struct FakeBroker {
    inner: Arc<BrokerInner>,
    producer_connections: AtomicUsize,
    consumer_connections: AtomicUsize,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every publish keyed `key` fail.
    pub fn fail_key(&self, key: &str) {
        self.inner.failing_keys.lock().insert(key.as_bytes().to_vec());
    }

    pub fn heal_key(&self, key: &str) {
        self.inner.failing_keys.lock().remove(key.as_bytes());
    }

    /// Appends a record to a partition as if another producer wrote it.
    pub fn seed(&self, partition: i32, value: &[u8]) -> i64 {
        self.inner.state.lock().append(Message {
            topic: TOPIC.into(),
            partition,
            offset: 0,
            key: None,
            value: Some(value.to_vec()),
            headers: Vec::new(),
            timestamp: None,
        })
    }

    /// Records on the broker, in append order.
    pub fn published(&self) -> Vec<Message> {
        self.inner.state.lock().log.clone()
    }

    pub fn committed(&self) -> HashMap<TopicPartition, i64> {
        self.inner.state.lock().committed.clone()
    }

    pub fn commit_calls(&self) -> usize {
        self.inner.state.lock().commit_calls
    }

    /// Records past the committed position of their partition.
    pub fn uncommitted(&self) -> usize {
        let state = self.inner.state.lock();
        state
            .log
            .iter()
            .filter(|message| message.offset >= state.committed.get(&message.tp()).copied().unwrap_or(0))
            .count()
    }

    pub fn producer_connections(&self) -> usize {
        self.producer_connections.load(Ordering::SeqCst)
    }

    pub fn consumer_connections(&self) -> usize {
        self.consumer_connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerConnector for FakeBroker {
    async fn connect_producer(&self) -> Result<Arc<dyn ProducerClient>, TransportError> {
        self.producer_connections.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeProducerClient {
            broker: Arc::clone(&self.inner),
        }))
    }

    async fn connect_consumer(&self) -> Result<Arc<dyn ConsumerClient>, TransportError> {
        self.consumer_connections.fetch_add(1, Ordering::SeqCst);
        let positions = self.inner.state.lock().committed.clone();
        Ok(Arc::new(FakeConsumerClient {
            broker: Arc::clone(&self.inner),
            topics: Mutex::new(Vec::new()),
            positions: Mutex::new(positions),
        }))
    }
}

struct FakeProducerClient {
    broker: Arc<BrokerInner>,
}

#[async_trait]
impl ProducerClient for FakeProducerClient {
    async fn send(&self, record: OutgoingRecord) -> Result<RecordMetadata, TransportError> {
        if let Some(key) = &record.key {
            if self.broker.failing_keys.lock().contains(key) {
                return Err(TransportError::Internal("injected publish failure".into()));
            }
        }

        let partition = record.partition.unwrap_or(0);
        let offset = self.broker.state.lock().append(Message {
            topic: record.topic.clone(),
            partition,
            offset: 0,
            key: record.key,
            value: record.value,
            headers: record.headers,
            timestamp: record.timestamp,
        });

        Ok(RecordMetadata::new(record.topic, partition, offset, record.timestamp))
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct FakeConsumerClient {
    broker: Arc<BrokerInner>,
    topics: Mutex<Vec<String>>,
    /// Position after the last record handed out, per partition
    positions: Mutex<HashMap<TopicPartition, i64>>,
}

impl FakeConsumerClient {
    fn take(&self, max: usize) -> Vec<Message> {
        let topics = self.topics.lock().clone();
        let state = self.broker.state.lock();
        let mut positions = self.positions.lock();

        let mut taken = Vec::new();
        for message in &state.log {
            if taken.len() >= max {
                break;
            }
            if !topics.contains(&message.topic) {
                continue;
            }
            let position = positions.entry(message.tp()).or_insert(0);
            if message.offset >= *position {
                *position = message.offset + 1;
                taken.push(message.clone());
            }
        }
        taken
    }
}

#[async_trait]
impl ConsumerClient for FakeConsumerClient {
    fn subscribe(&self, topics: &[String]) -> Result<(), TransportError> {
        *self.topics.lock() = topics.to_vec();
        Ok(())
    }

    async fn fetch_one(&self) -> Result<Message, TransportError> {
        loop {
            if let Some(message) = self.take(1).pop() {
                return Ok(message);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn fetch_many(&self, max_records: usize, _timeout: Duration) -> Result<Vec<Message>, TransportError> {
        Ok(self.take(max_records))
    }

    async fn commit_all(&self) -> Result<(), TransportError> {
        let positions = self.positions.lock().clone();
        let mut state = self.broker.state.lock();
        state.commit_calls += 1;
        state.committed.extend(positions);
        Ok(())
    }

    async fn commit(&self, offsets: &HashMap<TopicPartition, i64>) -> Result<(), TransportError> {
        let mut state = self.broker.state.lock();
        state.commit_calls += 1;
        state.committed.extend(offsets.iter().map(|(tp, offset)| (tp.clone(), *offset)));
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Transport over a fake broker with short timeouts.
pub fn transport(broker: &Arc<FakeBroker>, buffer_capacity: usize) -> BrokerTransport {
    let producer_options = ProducerOptions {
        buffer_capacity,
        publish_timeout: Duration::from_millis(100),
        ..ProducerOptions::default()
    };
    let consumer_options = ConsumerOptions {
        ready_timeout: Duration::from_millis(100),
    };
    BrokerTransport::new(broker.clone(), producer_options, consumer_options)
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// Outbox keeping lists in memory. Scans page through every key ever
/// written, in first-write order, using the page end index as the cursor
/// token; keys that were drained meanwhile are left out of the page.
pub struct InMemoryOutbox {
    namespace: String,
    lists: Mutex<BTreeMap<String, VecDeque<String>>>,
    registry: Mutex<Vec<String>>,
    failing_peeks: Mutex<HashSet<String>>,
    scans: AtomicUsize,
}

impl InMemoryOutbox {
    pub fn new(namespace: &str) -> Arc<Self> {
        Arc::new(Self {
            namespace: namespace.to_owned(),
            lists: Mutex::new(BTreeMap::new()),
            registry: Mutex::new(Vec::new()),
            failing_peeks: Mutex::new(HashSet::new()),
            scans: AtomicUsize::new(0),
        })
    }

    pub fn len(&self, key: &str) -> usize {
        self.lists.lock().get(key).map_or(0, VecDeque::len)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lists.lock().contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.lists.lock().is_empty()
    }

    pub fn entries(&self, key: &str) -> Vec<String> {
        self.lists
            .lock()
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    /// Makes every read of `key` fail with a Redis I/O error.
    pub fn fail_peek(&self, key: &str) {
        self.failing_peeks.lock().insert(key.to_owned());
    }

    pub fn heal_peek(&self, key: &str) {
        self.failing_peeks.lock().remove(key);
    }

    fn is_outbox_key(&self, key: &str) -> bool {
        key.starts_with(&format!("{}:", self.namespace)) && key.ends_with(":messages")
    }
}

#[async_trait]
impl OutboxQueue for InMemoryOutbox {
    async fn scan(&self, cursor: Cursor, count: usize) -> Result<ScanPage, OutboxError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let registry: Vec<String> = self
            .registry
            .lock()
            .iter()
            .filter(|key| self.is_outbox_key(key))
            .cloned()
            .collect();

        let start = (cursor.token() as usize).min(registry.len());
        let end = (start + count).min(registry.len());
        let next = if end >= registry.len() { 0 } else { end as u64 };

        let lists = self.lists.lock();
        let keys = registry[start..end]
            .iter()
            .filter(|key| lists.contains_key(key.as_str()))
            .cloned()
            .collect();

        Ok(ScanPage {
            next: Cursor::from_token(next),
            keys,
        })
    }

    async fn peek(&self, key: &str, limit: usize) -> Result<Vec<String>, OutboxError> {
        if self.failing_peeks.lock().contains(key) {
            return Err(redis::RedisError::from((redis::ErrorKind::Io, "injected peek failure")).into());
        }
        Ok(self
            .lists
            .lock()
            .get(key)
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn trim(&self, key: &str, count: usize) -> Result<(), OutboxError> {
        let mut lists = self.lists.lock();
        if let Some(list) = lists.get_mut(key) {
            let count = count.min(list.len());
            list.drain(..count);
            if list.is_empty() {
                lists.remove(key);
            }
        }
        Ok(())
    }

    async fn push(&self, key: &str, entries: &[String]) -> Result<usize, OutboxError> {
        {
            let mut registry = self.registry.lock();
            if !registry.iter().any(|known| known == key) {
                registry.push(key.to_owned());
            }
        }
        let mut lists = self.lists.lock();
        let list = lists.entry(key.to_owned()).or_default();
        list.extend(entries.iter().cloned());
        Ok(list.len())
    }
}

// ---------------------------------------------------------------------------
// Document store
// ---------------------------------------------------------------------------

/// Repository recording every stored message. `fail_on(k)` makes the k-th
/// call (1-based) fail.
#[derive(Default)]
pub struct RecordingRepository {
    stored: Mutex<Vec<NewChatMessage>>,
    calls: AtomicUsize,
    fail_on: Mutex<Option<usize>>,
}

impl RecordingRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, call: usize) {
        *self.fail_on.lock() = Some(call);
    }

    pub fn stored(&self) -> Vec<NewChatMessage> {
        self.stored.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageRepository for RecordingRepository {
    async fn create(&self, message: &NewChatMessage) -> Result<StoredChatMessage, RepositoryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_on.lock() == Some(call) {
            return Err(RepositoryError::InvalidDocument(format!("injected failure on call {}", call)));
        }

        self.stored.lock().push(message.clone());
        Ok(StoredChatMessage {
            id: format!("{:024x}", call),
            message: message.clone(),
            created_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn chat_message(author_id: i64, conversation_id: &str, text: &str) -> NewChatMessage {
    NewChatMessage::new(author_id, conversation_id, MessageContent::text(text))
}

pub fn envelope(author_id: i64, conversation_id: &str, text: &str) -> String {
    serde_json::to_string(&chat_message(author_id, conversation_id, text)).unwrap()
}
