//! # Chat Relay
//!
//! Runs the outbox relays of the chat backend.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Redis, MongoDB and Kafka clients
//! - The RedisToKafka and KafkaToMongo relay loops

use anyhow::Result;
use tracing::info;

use chat_relay::config::Settings;
use chat_relay::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    chat_relay::telemetry::init_tracing();

    info!("Starting Chat Relay...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        brokers = %settings.kafka.bootstrap_servers,
        topic = %settings.kafka.topic,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Relays ready");
    application.run_until_stopped().await?;

    Ok(())
}
