//! Producer
//!
//! Buffered publisher: `send` returns a [`DeliveryFuture`] right away and the
//! record is published on the next `flush`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::buffer::{ProducerBuffer, DEFAULT_BUFFER_CAPACITY};
use super::channel::ProducerChannel;
use super::codec::{CodecRef, JsonCodec};
use super::future::{DeliveryFuture, FutureMessage};
use super::lifecycle::LifecycleState;
use super::record::{PendingMessage, ProducerRecord};
use crate::shared::error::TransportError;

/// Producer tuning.
#[derive(Debug, Clone)]
pub struct ProducerOptions {
    pub buffer_capacity: usize,
    /// Upper bound on the readiness wait of each publish
    pub publish_timeout: Duration,
    pub key_codec: CodecRef,
    pub value_codec: CodecRef,
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            publish_timeout: Duration::from_secs(10),
            key_codec: Arc::new(JsonCodec),
            value_codec: Arc::new(JsonCodec),
        }
    }
}

/// Buffered producer over a [`ProducerChannel`].
pub struct Producer {
    channel: Arc<dyn ProducerChannel>,
    buffer: ProducerBuffer,
    key_codec: CodecRef,
    value_codec: CodecRef,
    state: RwLock<LifecycleState>,
}

impl Producer {
    pub fn new(channel: Arc<dyn ProducerChannel>, options: &ProducerOptions) -> Self {
        let buffer = ProducerBuffer::new(
            Arc::clone(&channel),
            options.buffer_capacity,
            options.publish_timeout,
        );
        Self {
            channel,
            buffer,
            key_codec: options.key_codec.clone(),
            value_codec: options.value_codec.clone(),
            state: RwLock::new(LifecycleState::NotReady),
        }
    }

    /// Starts the underlying channel. No-op when already started.
    pub async fn start(&self) -> Result<(), TransportError> {
        if *self.state.read() == LifecycleState::Ready {
            return Ok(());
        }

        self.channel.start().await?;
        *self.state.write() = LifecycleState::Ready;
        info!(capacity = self.buffer.capacity(), "Producer started");
        Ok(())
    }

    /// Queues a record for publishing.
    ///
    /// The returned future settles once the record is flushed; it can be
    /// awaited for confirmation or dropped. A full buffer settles it
    /// immediately with [`TransportError::BufferFull`].
    pub fn send(&self, record: ProducerRecord) -> Result<DeliveryFuture, TransportError> {
        self.ensure_ready()?;

        let pending = PendingMessage::from_record(record, &self.key_codec, &self.value_codec);
        let (future, delivery) = FutureMessage::new(pending);
        self.buffer.put(future);
        Ok(delivery)
    }

    /// Publishes everything currently buffered.
    pub async fn flush(&self) -> Result<usize, TransportError> {
        self.ensure_ready()?;
        Ok(self.buffer.flush().await)
    }

    /// Flushes remaining records and stops the channel. Idempotent.
    ///
    /// Anything that still reaches the buffer after the final flush is
    /// failed with `Closed`, so no delivery is left pending.
    pub async fn close(&self) -> Result<(), TransportError> {
        {
            let mut state = self.state.write();
            if *state == LifecycleState::Closed {
                return Ok(());
            }
            *state = LifecycleState::Closed;
        }

        let flushed = self.buffer.flush().await;
        let stopped = self.channel.stop().await;
        let failed = self.buffer.fail_all();

        if failed > 0 {
            warn!(failed, "Failed deliveries queued during close");
        }
        debug!(flushed, "Producer closed");
        stopped
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    /// Records waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.size()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Fails every queued record with `Closed` without sending it.
    pub fn discard(&self) -> usize {
        self.buffer.fail_all()
    }

    fn ensure_ready(&self) -> Result<(), TransportError> {
        match *self.state.read() {
            LifecycleState::Ready => Ok(()),
            LifecycleState::NotReady => Err(TransportError::NotReady),
            LifecycleState::Closed => Err(TransportError::Closed),
        }
    }
}
