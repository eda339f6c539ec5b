//! Outbox Queue
//!
//! Redis lists staging chat messages until a relay moves them to the broker.
//!
//! Writers append JSON envelopes to `<namespace>:<id>:messages` with
//! `push`. The relay sweeps the keyspace page by page with `scan`, reads a
//! bounded prefix of each list with `peek` and removes what it relayed with
//! `trim`. Redis deletes a list once its last element is removed, so a
//! drained key disappears on its own.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::Serialize;
use tracing::{debug, instrument};

use super::keys;
use crate::domain::Cursor;
use crate::infrastructure::messaging::CodecError;
use crate::shared::error::OutboxError;

/// One page of a keyspace sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor to pass to the next `scan`
    pub next: Cursor,
    pub keys: Vec<String>,
}

/// Queue of outbox lists keyed by conversation.
#[async_trait]
pub trait OutboxQueue: Send + Sync {
    /// Fetches the next page of outbox keys, at most roughly `count` long.
    async fn scan(&self, cursor: Cursor, count: usize) -> Result<ScanPage, OutboxError>;

    /// Reads up to `limit` entries from the head of `key` without removing them.
    async fn peek(&self, key: &str, limit: usize) -> Result<Vec<String>, OutboxError>;

    /// Removes the first `count` entries of `key`.
    async fn trim(&self, key: &str, count: usize) -> Result<(), OutboxError>;

    /// Appends raw entries to the tail of `key`. Returns the new length.
    async fn push(&self, key: &str, entries: &[String]) -> Result<usize, OutboxError>;
}

/// Redis-backed outbox.
#[derive(Clone)]
pub struct RedisOutbox {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisOutbox {
    pub fn new(conn: ConnectionManager, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Serializes `message` and appends it to the outbox of `id`.
    pub async fn enqueue<T: Serialize + Sync>(
        &self,
        id: impl std::fmt::Display,
        message: &T,
    ) -> Result<usize, OutboxError> {
        let entry = serde_json::to_string(message).map_err(CodecError::from)?;
        self.push(&keys::outbox(&self.namespace, id), &[entry]).await
    }
}

#[async_trait]
impl OutboxQueue for RedisOutbox {
    #[instrument(skip(self), level = "debug")]
    async fn scan(&self, cursor: Cursor, count: usize) -> Result<ScanPage, OutboxError> {
        let mut conn = self.conn.clone();

        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor.token())
            .arg("MATCH")
            .arg(keys::outbox_pattern(&self.namespace))
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        debug!(next, found = keys.len(), "Outbox scan page");
        Ok(ScanPage {
            next: Cursor::from_token(next),
            keys,
        })
    }

    async fn peek(&self, key: &str, limit: usize) -> Result<Vec<String>, OutboxError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let stop = isize::try_from(limit).unwrap_or(isize::MAX) - 1;
        let entries: Vec<String> = conn.lrange(key, 0, stop).await?;
        Ok(entries)
    }

    async fn trim(&self, key: &str, count: usize) -> Result<(), OutboxError> {
        if count == 0 {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let start = isize::try_from(count).unwrap_or(isize::MAX);
        let _: () = conn.ltrim(key, start, -1).await?;
        debug!(key = %key, count, "Outbox trimmed");
        Ok(())
    }

    async fn push(&self, key: &str, entries: &[String]) -> Result<usize, OutboxError> {
        let mut conn = self.conn.clone();
        let len: usize = conn.rpush(key, entries).await?;
        Ok(len)
    }
}
