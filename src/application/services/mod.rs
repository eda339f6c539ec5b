//! Application Services
//!
//! Relay services that move chat messages between storage systems.
//!
//! ## Available Services
//!
//! - **RedisToKafka**: drains the Redis outbox into the broker
//! - **KafkaToMongo**: persists broker records into MongoDB

pub mod kafka_to_mongo;
pub mod redis_to_kafka;
pub mod relay;

pub use kafka_to_mongo::{KafkaToMongo, KafkaToMongoConfig};
pub use redis_to_kafka::{RedisToKafka, RedisToKafkaConfig};
pub use relay::{relay_headers, RelayService, TickSummary, RELAY_VERSION};
