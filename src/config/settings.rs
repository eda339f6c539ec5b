//! Relay settings and configuration structures.

use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Kafka broker configuration
    pub kafka: KafkaSettings,

    /// Redis outbox configuration
    pub redis: RedisSettings,

    /// MongoDB document store configuration
    pub mongo: MongoSettings,

    /// Producer buffer and publish tuning
    pub producer: ProducerSettings,

    /// Consumer batch tuning
    pub consumer: ConsumerSettings,

    /// Job runner configuration
    pub scheduler: SchedulerSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Kafka broker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaSettings {
    /// Comma-separated broker list
    pub bootstrap_servers: String,

    /// Consumer group id
    pub group_id: String,

    /// Client id reported to the brokers
    pub client_id: String,

    /// Where a new consumer group starts reading (earliest, latest)
    pub auto_offset_reset: String,

    /// Topic chat messages are relayed through
    pub topic: String,

    pub session_timeout_ms: u64,

    /// Codec applied to record keys (json, raw)
    pub key_codec: String,

    /// Codec applied to record values (json, raw)
    pub value_codec: String,
}

/// Redis outbox configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,

    /// Key namespace; outbox keys look like `<namespace>:<id>:messages`
    pub namespace: String,

    /// SCAN page size hint
    pub scan_count: usize,

    /// Entries read per key and tick
    pub batch_size: usize,
}

/// MongoDB configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MongoSettings {
    /// MongoDB connection URL
    pub url: String,

    pub database: String,

    pub collection: String,
}

/// Producer tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerSettings {
    /// Pending sends held before `send` starts rejecting
    pub buffer_capacity: usize,

    /// Broker delivery timeout per record
    pub publish_timeout_ms: u64,

    /// Readiness wait bound per publish
    pub ready_timeout_ms: u64,
}

/// Consumer tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerSettings {
    /// Upper bound on records per batch
    pub max_records: usize,

    /// Time budget for filling a batch
    pub batch_timeout_ms: u64,

    /// Readiness wait bound
    pub ready_timeout_ms: u64,
}

/// Job runner configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// Pause between job runs
    pub interval_secs: u64,

    /// Ticks per RedisToKafka job run
    pub max_iterations: u32,

    /// Ticks per KafkaToMongo job run
    pub max_batches: u32,

    /// Retries after a failed job run
    pub max_retries: u32,

    pub backoff_base_secs: u64,

    pub backoff_max_secs: u64,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. Built-in defaults
    /// 2. config/default.toml (base configuration)
    /// 3. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 4. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if a size knob is zero.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Self::defaults(&environment)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__KAFKA__TOPIC=chat-messages -> kafka.topic = chat-messages
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option(
                "kafka.bootstrap_servers",
                std::env::var("KAFKA_BOOTSTRAP_SERVERS").ok(),
            )?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("mongo.url", std::env::var("MONGO_URL").ok())?
            .build()?
            .try_deserialize()
            .and_then(Self::validate)
    }

    /// Settings built from defaults alone, ignoring files and environment.
    pub fn default_for(environment: &str) -> Result<Self, ConfigError> {
        Self::defaults(environment)?
            .build()?
            .try_deserialize()
            .and_then(Self::validate)
    }

    fn defaults(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", environment)?
            .set_default("kafka.bootstrap_servers", "localhost:9092")?
            .set_default("kafka.group_id", "chat-relay")?
            .set_default("kafka.client_id", "chat-relay")?
            .set_default("kafka.auto_offset_reset", "earliest")?
            .set_default("kafka.topic", "chat-messages")?
            .set_default("kafka.session_timeout_ms", 30000_i64)?
            .set_default("kafka.key_codec", "raw")?
            .set_default("kafka.value_codec", "json")?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            .set_default("redis.namespace", "chat")?
            .set_default("redis.scan_count", 100_i64)?
            .set_default("redis.batch_size", 100_i64)?
            .set_default("mongo.url", "mongodb://localhost:27017")?
            .set_default("mongo.database", "chat-db")?
            .set_default("mongo.collection", "messages")?
            .set_default("producer.buffer_capacity", 100_i64)?
            .set_default("producer.publish_timeout_ms", 5000_i64)?
            .set_default("producer.ready_timeout_ms", 10000_i64)?
            .set_default("consumer.max_records", 100_i64)?
            .set_default("consumer.batch_timeout_ms", 1000_i64)?
            .set_default("consumer.ready_timeout_ms", 10000_i64)?
            .set_default("scheduler.interval_secs", 10_i64)?
            .set_default("scheduler.max_iterations", 10_i64)?
            .set_default("scheduler.max_batches", 10_i64)?
            .set_default("scheduler.max_retries", 3_i64)?
            .set_default("scheduler.backoff_base_secs", 60_i64)?
            .set_default("scheduler.backoff_max_secs", 300_i64)
    }

    fn validate(settings: Self) -> Result<Self, ConfigError> {
        let knobs = [
            ("producer.buffer_capacity", settings.producer.buffer_capacity),
            ("consumer.max_records", settings.consumer.max_records),
            ("redis.batch_size", settings.redis.batch_size),
            ("redis.scan_count", settings.redis.scan_count),
        ];

        for (name, value) in knobs {
            if value == 0 {
                return Err(ConfigError::Message(format!("{} must be greater than zero", name)));
            }
        }
        Ok(settings)
    }
}

impl ProducerSettings {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

impl ConsumerSettings {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

impl SchedulerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
