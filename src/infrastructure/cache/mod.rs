//! Cache Module
//!
//! Redis connection management and the outbox queue built on it.
//!
//! This module provides:
//! - Redis connection management with automatic reconnection
//! - An `OutboxQueue` trait abstracting the staging lists
//! - A `RedisOutbox` implementation over Redis lists
//! - Key helpers for consistent outbox key naming
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! |   Relay Service   |
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! | OutboxQueue Trait |  <-- Abstract interface
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! |   RedisOutbox     |  <-- Concrete implementation
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! | ConnectionManager |  <-- Redis connection
//! +-------------------+
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use chat_relay::infrastructure::cache::{create_redis_client, keys, OutboxQueue, RedisOutbox};
//!
//! let conn = create_redis_client(&settings.redis).await?;
//! let outbox = RedisOutbox::new(conn, "chat");
//!
//! outbox.enqueue(42, &message).await?;
//! let entries = outbox.peek(&keys::outbox("chat", 42), 100).await?;
//! ```

mod outbox;

pub use outbox::{OutboxQueue, RedisOutbox, ScanPage};

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
///
/// # Arguments
/// * `settings` - Redis configuration settings
///
/// # Returns
/// * `Ok(ConnectionManager)` - On successful connection
/// * `Err(redis::RedisError)` - If connection fails
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Outbox key naming.
///
/// # Example
/// ```rust,ignore
/// use chat_relay::infrastructure::cache::keys;
///
/// assert_eq!(keys::outbox("chat", 42), "chat:42:messages");
/// ```
pub mod keys {
    /// Suffix shared by every outbox list
    pub const OUTBOX_SUFFIX: &str = "messages";

    /// Generates the outbox key of a conversation
    #[inline]
    pub fn outbox(namespace: &str, id: impl std::fmt::Display) -> String {
        format!("{}:{}:{}", namespace, id, OUTBOX_SUFFIX)
    }

    /// SCAN pattern matching every outbox key of a namespace
    #[inline]
    pub fn outbox_pattern(namespace: &str) -> String {
        format!("{}:*:{}", namespace, OUTBOX_SUFFIX)
    }

    /// Extracts the `<id>` segment of an outbox key.
    pub fn conversation_id(key: &str) -> Option<&str> {
        let head = key.strip_suffix(OUTBOX_SUFFIX)?.strip_suffix(':')?;
        let (_namespace, id) = head.split_once(':')?;
        (!id.is_empty()).then_some(id)
    }
}
