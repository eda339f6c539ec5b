//! Transport Tests
//!
//! Producer, consumer and channel behavior over the in-memory broker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use chat_relay::infrastructure::messaging::{
    BrokerProducerChannel, CodecRef, FutureMessage, JsonCodec, Lifecycle, LifecycleState, PendingMessage,
    ProducerChannel, ProducerRecord, TopicPartition, Transport,
};
use chat_relay::shared::error::TransportError;

use crate::common::{transport, FakeBroker, TOPIC};

fn record(key: &str, text: &str) -> ProducerRecord {
    ProducerRecord::new(TOPIC).key(key).value(json!({ "text": text }))
}

fn pending(key: &str) -> PendingMessage {
    let codec: CodecRef = Arc::new(JsonCodec);
    PendingMessage::from_record(record(key, "hi"), &codec, &codec)
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_send_before_start_fails_fast() {
    let broker = FakeBroker::new();
    let producer = transport(&broker, 10).create_producer();

    let result = producer.send(record("1", "early"));

    assert!(matches!(result, Err(TransportError::NotReady)));
    assert_eq!(broker.producer_connections(), 0);
}

#[tokio::test]
async fn test_flush_resolves_every_delivery() {
    let broker = FakeBroker::new();
    let producer = transport(&broker, 10).create_producer();
    assert_ok!(producer.start().await);

    let first = producer.send(record("1", "a")).unwrap();
    let second = producer.send(record("1", "b")).unwrap();
    assert_eq!(producer.buffered(), 2);

    assert_eq!(producer.flush().await.unwrap(), 2);
    assert_eq!(producer.buffered(), 0);

    let first = first.await.unwrap();
    let second = second.await.unwrap();
    assert_eq!(first.topic, TOPIC);
    assert_eq!(second.offset, first.offset + 1);
    assert_eq!(broker.published().len(), 2);
}

#[tokio::test]
async fn test_publish_failure_is_isolated_per_message() {
    let broker = FakeBroker::new();
    broker.fail_key("bad");
    let producer = transport(&broker, 10).create_producer();
    producer.start().await.unwrap();

    let good = producer.send(record("good", "a")).unwrap();
    let bad = producer.send(record("bad", "b")).unwrap();
    producer.flush().await.unwrap();

    assert_ok!(good.await);
    assert_err!(bad.await);
    assert_eq!(broker.published().len(), 1);
}

#[tokio::test]
async fn test_full_buffer_rejects_synchronously() {
    let broker = FakeBroker::new();
    let producer = transport(&broker, 2).create_producer();
    producer.start().await.unwrap();

    let _first = producer.send(record("1", "a")).unwrap();
    let _second = producer.send(record("1", "b")).unwrap();
    let mut third = producer.send(record("1", "c")).unwrap();

    assert!(matches!(
        third.try_result(),
        Some(Err(TransportError::BufferFull { capacity: 2 }))
    ));
    assert_eq!(producer.buffered(), 2);
}

#[tokio::test]
async fn test_close_leaves_no_delivery_pending() {
    let broker = FakeBroker::new();
    let producer = transport(&broker, 10).create_producer();
    producer.start().await.unwrap();

    let deliveries: Vec<_> = (0..3)
        .map(|i| producer.send(record("7", &format!("message {}", i))).unwrap())
        .collect();

    producer.close().await.unwrap();

    for mut delivery in deliveries {
        assert!(matches!(delivery.try_result(), Some(Ok(_))));
    }
    assert_eq!(broker.published().len(), 3);
    assert_eq!(producer.state(), LifecycleState::Closed);
}

#[tokio::test]
async fn test_operations_after_close_fail_fast() {
    let broker = FakeBroker::new();
    let producer = transport(&broker, 10).create_producer();
    producer.start().await.unwrap();
    producer.close().await.unwrap();

    assert!(matches!(producer.send(record("1", "late")), Err(TransportError::Closed)));
    assert!(matches!(producer.flush().await, Err(TransportError::Closed)));
    assert_ok!(producer.close().await);
}

#[tokio::test]
async fn test_restart_does_not_reconnect() {
    let broker = FakeBroker::new();
    let producer = transport(&broker, 10).create_producer();

    producer.start().await.unwrap();
    producer.start().await.unwrap();

    assert_eq!(broker.producer_connections(), 1);
}

// ---------------------------------------------------------------------------
// Producer channel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_channel_start_and_stop_are_idempotent() {
    let broker = FakeBroker::new();
    let channel = BrokerProducerChannel::new(broker.clone());

    channel.start().await.unwrap();
    channel.start().await.unwrap();
    assert_eq!(broker.producer_connections(), 1);
    assert_eq!(channel.state(), LifecycleState::Ready);

    channel.stop().await.unwrap();
    assert_ok!(channel.stop().await);
    assert_eq!(channel.state(), LifecycleState::Closed);
}

#[tokio::test]
async fn test_publish_on_unstarted_channel_times_out() {
    let broker = FakeBroker::new();
    let channel = BrokerProducerChannel::new(broker.clone());
    let (future, delivery) = FutureMessage::new(pending("1"));

    channel.publish(future, Duration::from_millis(20)).await;

    assert!(matches!(delivery.await, Err(TransportError::Timeout(_))));
    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn test_stop_releases_readiness_waiters() {
    let broker = FakeBroker::new();
    let channel = Arc::new(BrokerProducerChannel::new(broker.clone()));
    let (future, delivery) = FutureMessage::new(pending("1"));

    let waiter = tokio::spawn({
        let channel = Arc::clone(&channel);
        async move { channel.publish(future, Duration::from_secs(30)).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    channel.stop().await.unwrap();
    waiter.await.unwrap();

    assert!(matches!(delivery.await, Err(TransportError::Closed)));
}

#[tokio::test]
async fn test_publish_after_stop_resolves_closed() {
    let broker = FakeBroker::new();
    let channel = BrokerProducerChannel::new(broker.clone());
    channel.start().await.unwrap();
    channel.stop().await.unwrap();

    let (future, delivery) = FutureMessage::new(pending("1"));
    channel.publish(future, Duration::from_millis(20)).await;

    assert!(matches!(delivery.await, Err(TransportError::Closed)));
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_consume_before_subscribe_fails() {
    let broker = FakeBroker::new();
    let consumer = transport(&broker, 10).create_consumer();
    consumer.start().await.unwrap();

    assert!(matches!(consumer.consume().await, Err(TransportError::NotSubscribed)));
    assert!(matches!(
        consumer.consume_batch(10, Duration::from_millis(10)).await,
        Err(TransportError::NotSubscribed)
    ));
}

#[tokio::test]
async fn test_consume_returns_published_record() {
    let broker = FakeBroker::new();
    let transport = transport(&broker, 10);

    let producer = transport.create_producer();
    producer.start().await.unwrap();
    let delivery = producer.send(record("42", "hello")).unwrap();
    producer.flush().await.unwrap();
    delivery.await.unwrap();

    let consumer = transport.create_consumer();
    consumer.subscribe([TOPIC]).await.unwrap();
    consumer.start().await.unwrap();

    let message = consumer.consume().await.unwrap();
    assert_eq!(message.key.as_deref(), Some(&b"42"[..]));
    let value: serde_json::Value = serde_json::from_slice(message.value.as_deref().unwrap()).unwrap();
    assert_eq!(value, json!({ "text": "hello" }));
}

#[tokio::test]
async fn test_consume_batch_groups_by_partition() {
    let broker = FakeBroker::new();
    broker.seed(1, b"{}");
    broker.seed(0, b"{}");
    broker.seed(1, b"{}");

    let consumer = transport(&broker, 10).create_consumer();
    consumer.subscribe([TOPIC]).await.unwrap();
    consumer.start().await.unwrap();

    let batch = consumer.consume_batch(10, Duration::from_millis(10)).await.unwrap();
    let positions: Vec<(i32, i64)> = batch.iter().map(|m| (m.partition, m.offset)).collect();
    assert_eq!(positions, vec![(1, 0), (1, 1), (0, 0)]);
}

#[tokio::test]
async fn test_empty_commit_map_commits_all_fetched() {
    let broker = FakeBroker::new();
    broker.seed(0, b"{}");
    broker.seed(0, b"{}");
    broker.seed(1, b"{}");

    let consumer = transport(&broker, 10).create_consumer();
    consumer.subscribe([TOPIC]).await.unwrap();
    consumer.start().await.unwrap();
    consumer.consume_batch(10, Duration::from_millis(10)).await.unwrap();

    consumer.commit_offsets(&HashMap::new()).await.unwrap();

    let committed = broker.committed();
    assert_eq!(committed.get(&TopicPartition::new(TOPIC, 0)), Some(&2));
    assert_eq!(committed.get(&TopicPartition::new(TOPIC, 1)), Some(&1));
}

#[tokio::test]
async fn test_explicit_commit_map_commits_exactly_that() {
    let broker = FakeBroker::new();
    for _ in 0..3 {
        broker.seed(0, b"{}");
    }
    broker.seed(1, b"{}");

    let consumer = transport(&broker, 10).create_consumer();
    consumer.subscribe([TOPIC]).await.unwrap();
    consumer.start().await.unwrap();
    consumer.consume_batch(10, Duration::from_millis(10)).await.unwrap();

    let offsets = HashMap::from([(TopicPartition::new(TOPIC, 0), 1)]);
    consumer.commit_offsets(&offsets).await.unwrap();

    assert_eq!(broker.committed(), offsets);
}

#[tokio::test]
async fn test_consumer_close_commits_and_is_idempotent() {
    let broker = FakeBroker::new();
    broker.seed(0, b"{}");

    let consumer = transport(&broker, 10).create_consumer();
    consumer.subscribe([TOPIC]).await.unwrap();
    consumer.start().await.unwrap();
    consumer.consume_batch(10, Duration::from_millis(10)).await.unwrap();

    consumer.close().await.unwrap();
    consumer.close().await.unwrap();

    assert_eq!(broker.commit_calls(), 1);
    assert_eq!(broker.committed().get(&TopicPartition::new(TOPIC, 0)), Some(&1));
    assert!(matches!(consumer.consume().await, Err(TransportError::Closed)));
}

#[tokio::test]
async fn test_consumer_abort_skips_commit() {
    let broker = FakeBroker::new();
    broker.seed(0, b"{}");

    let transport = transport(&broker, 10);
    let consumer = transport.create_consumer();
    consumer.subscribe([TOPIC]).await.unwrap();
    consumer.start().await.unwrap();
    assert_eq!(consumer.consume_batch(10, Duration::from_millis(10)).await.unwrap().len(), 1);

    consumer.abort().await.unwrap();
    assert_eq!(broker.commit_calls(), 0);

    let next = transport.create_consumer();
    next.subscribe([TOPIC]).await.unwrap();
    next.start().await.unwrap();
    assert_eq!(next.consume_batch(10, Duration::from_millis(10)).await.unwrap().len(), 1);
}
