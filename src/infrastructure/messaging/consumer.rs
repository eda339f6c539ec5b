//! Consumer
//!
//! Wrapper over a [`ConsumerChannel`] that refuses to fetch before
//! `subscribe` and commits on close.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use super::channel::ConsumerChannel;
use super::lifecycle::LifecycleState;
use super::record::{Message, TopicPartition};
use crate::shared::error::TransportError;

/// Consumer tuning.
#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    /// Upper bound on readiness waits and single-record fetches
    pub ready_timeout: Duration,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Default)]
struct ConsumerState {
    lifecycle: LifecycleState,
    subscribed: bool,
}

/// Subscribe-before-consume wrapper over a consumer channel.
pub struct Consumer {
    channel: Arc<dyn ConsumerChannel>,
    state: Mutex<ConsumerState>,
    ready_timeout: Duration,
}

impl Consumer {
    pub fn new(channel: Arc<dyn ConsumerChannel>, options: &ConsumerOptions) -> Self {
        Self {
            channel,
            state: Mutex::new(ConsumerState::default()),
            ready_timeout: options.ready_timeout,
        }
    }

    /// Starts the underlying channel. No-op when already started.
    pub async fn start(&self) -> Result<(), TransportError> {
        if self.state.lock().lifecycle == LifecycleState::Ready {
            return Ok(());
        }

        self.channel.start().await?;
        self.state.lock().lifecycle = LifecycleState::Ready;
        info!("Consumer started");
        Ok(())
    }

    /// Registers interest in `topics`. May be called before `start`.
    pub async fn subscribe<I, S>(&self, topics: I) -> Result<(), TransportError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.state.lock().lifecycle == LifecycleState::Closed {
            return Err(TransportError::Closed);
        }

        let topics: Vec<String> = topics.into_iter().map(Into::into).collect();
        self.channel.subscribe(&topics).await?;
        self.state.lock().subscribed = true;
        info!(topics = ?topics, "Consumer subscribed");
        Ok(())
    }

    /// Fetches a single record.
    pub async fn consume(&self) -> Result<Message, TransportError> {
        self.ensure_consumable()?;
        self.channel.consume(self.ready_timeout).await
    }

    /// Fetches up to `max_records` within `timeout`.
    pub async fn consume_batch(
        &self,
        max_records: usize,
        timeout: Duration,
    ) -> Result<Vec<Message>, TransportError> {
        self.ensure_consumable()?;
        self.channel.consume_batch(max_records, timeout).await
    }

    /// Commits every fetched position.
    pub async fn commit(&self) -> Result<(), TransportError> {
        self.commit_offsets(&HashMap::new()).await
    }

    /// Commits exactly the given offsets (or everything when empty).
    pub async fn commit_offsets(&self, offsets: &HashMap<TopicPartition, i64>) -> Result<(), TransportError> {
        if self.state.lock().lifecycle == LifecycleState::Closed {
            return Err(TransportError::Closed);
        }
        self.channel.commit_offsets(offsets).await
    }

    /// Commits outstanding offsets on a best-effort basis, then stops the
    /// channel. Idempotent.
    ///
    /// A failed commit only means those records are delivered again.
    pub async fn close(&self) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock();
            if state.lifecycle == LifecycleState::Closed {
                return Ok(());
            }
            state.lifecycle = LifecycleState::Closed;
        }

        if let Err(err) = self.channel.commit_offsets(&HashMap::new()).await {
            warn!(error = %err, "Commit on close failed; records will be redelivered");
        }

        self.channel.stop().await?;
        info!("Consumer closed");
        Ok(())
    }

    /// Stops the channel without committing, so everything fetched since
    /// the last commit is delivered again to the next consumer of the group.
    pub async fn abort(&self) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock();
            if state.lifecycle == LifecycleState::Closed {
                return Ok(());
            }
            state.lifecycle = LifecycleState::Closed;
        }

        self.channel.stop().await?;
        warn!("Consumer aborted without commit");
        Ok(())
    }

    pub fn state(&self) -> LifecycleState {
        self.state.lock().lifecycle
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.lock().subscribed
    }

    fn ensure_consumable(&self) -> Result<(), TransportError> {
        let state = self.state.lock();
        match state.lifecycle {
            LifecycleState::Closed => Err(TransportError::Closed),
            _ if !state.subscribed => Err(TransportError::NotSubscribed),
            _ => Ok(()),
        }
    }
}
