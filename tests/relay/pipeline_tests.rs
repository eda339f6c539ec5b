//! End-to-end pipeline: outbox, broker, document store.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use chat_relay::application::services::{
    KafkaToMongo, KafkaToMongoConfig, RedisToKafka, RedisToKafkaConfig, RelayService,
};
use chat_relay::infrastructure::cache::OutboxQueue;

use crate::common::{chat_message, envelope, transport, FakeBroker, InMemoryOutbox, RecordingRepository, TOPIC};

#[tokio::test]
async fn test_outbox_entries_reach_the_document_store() {
    let broker = FakeBroker::new();
    let outbox = InMemoryOutbox::new("chat");
    let repository = RecordingRepository::new();
    let transport = Arc::new(transport(&broker, 100));

    outbox
        .push(
            "chat:42:messages",
            &[envelope(1, "42", "hello"), envelope(2, "42", "hi there")],
        )
        .await
        .unwrap();
    outbox
        .push("chat:7:messages", &[envelope(3, "7", "ping")])
        .await
        .unwrap();

    let mut outbound = RedisToKafka::new(transport.clone(), outbox.clone(), RedisToKafkaConfig::new(TOPIC, 10, 10));
    let mut inbound = KafkaToMongo::new(
        transport,
        repository.clone(),
        KafkaToMongoConfig::new(TOPIC, 10, Duration::from_millis(10)),
    );

    outbound.start().await.unwrap();
    inbound.start().await.unwrap();

    assert_eq!(outbound.process().await.unwrap().handled, 3);
    assert_eq!(inbound.process().await.unwrap().handled, 3);

    outbound.stop().await;
    inbound.stop().await;

    assert!(outbox.is_empty());
    assert_eq!(broker.uncommitted(), 0);
    assert_eq!(
        repository.stored(),
        vec![
            chat_message(1, "42", "hello"),
            chat_message(2, "42", "hi there"),
            chat_message(3, "7", "ping"),
        ]
    );
}

#[tokio::test]
async fn test_numeric_conversation_id_survives_the_pipeline() {
    let broker = FakeBroker::new();
    let outbox = InMemoryOutbox::new("chat");
    let repository = RecordingRepository::new();
    let transport = Arc::new(transport(&broker, 100));

    outbox
        .push(
            "chat:42:messages",
            &[
                r#"{"authorId":1,"conversationId":42,"content":{"type":"text","text":"hello"}}"#.to_owned(),
                "{}".to_owned(),
                envelope(2, "42", "hi there"),
            ],
        )
        .await
        .unwrap();

    let mut outbound = RedisToKafka::new(transport.clone(), outbox.clone(), RedisToKafkaConfig::new(TOPIC, 10, 10));
    let mut inbound = KafkaToMongo::new(
        transport,
        repository.clone(),
        KafkaToMongoConfig::new(TOPIC, 10, Duration::from_millis(10)),
    );

    outbound.start().await.unwrap();
    inbound.start().await.unwrap();

    let sent = outbound.process().await.unwrap();
    assert_eq!((sent.handled, sent.skipped), (2, 1));
    let received = inbound.process().await.unwrap();
    assert_eq!((received.handled, received.skipped), (2, 0));

    outbound.stop().await;
    inbound.stop().await;

    assert!(outbox.is_empty());
    assert_eq!(broker.uncommitted(), 0);
    assert_eq!(
        repository.stored(),
        vec![chat_message(1, "42", "hello"), chat_message(2, "42", "hi there")]
    );
}
