//! Producer Buffer
//!
//! Bounded FIFO of pending deliveries between `Producer::send` and the
//! producer channel.
//!
//! `put` never blocks: when the buffer is full the delivery is failed on the
//! spot with [`TransportError::BufferFull`], which is the backpressure signal
//! callers see. `flush` drains everything queued at that moment and publishes
//! the entries concurrently; each entry settles on its own future so one
//! failed send never holds back its siblings.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::channel::ProducerChannel;
use super::future::FutureMessage;
use crate::infrastructure::metrics;
use crate::shared::error::TransportError;

/// Default number of deliveries a buffer holds before rejecting.
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Bounded queue of pending deliveries.
pub struct ProducerBuffer {
    channel: Arc<dyn ProducerChannel>,
    pending: Mutex<VecDeque<FutureMessage>>,
    capacity: usize,
    publish_timeout: Duration,
}

impl ProducerBuffer {
    pub fn new(channel: Arc<dyn ProducerChannel>, capacity: usize, publish_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            channel,
            pending: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            publish_timeout,
        }
    }

    /// Enqueues a delivery, or fails it immediately when the buffer is full.
    pub fn put(&self, future: FutureMessage) {
        let rejected = {
            let mut pending = self.pending.lock();
            if pending.len() >= self.capacity {
                Some(future)
            } else {
                pending.push_back(future);
                None
            }
        };

        if let Some(future) = rejected {
            warn!(capacity = self.capacity, topic = %future.message().topic(), "Producer buffer full");
            metrics::record_buffer_rejection();
            future.set_error(TransportError::BufferFull {
                capacity: self.capacity,
            });
        }
    }

    /// Publishes every delivery queued at call time. Returns how many were
    /// dispatched.
    pub async fn flush(&self) -> usize {
        let drained: Vec<FutureMessage> = self.pending.lock().drain(..).collect();
        if drained.is_empty() {
            return 0;
        }

        let count = drained.len();
        debug!(count, "Flushing producer buffer");

        join_all(
            drained
                .into_iter()
                .map(|future| self.channel.publish(future, self.publish_timeout)),
        )
        .await;

        count
    }

    /// Fails every queued delivery with `Closed`. Returns how many were failed.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<FutureMessage> = self.pending.lock().drain(..).collect();
        let count = drained.len();
        for future in drained {
            future.set_error(TransportError::Closed);
        }
        count
    }

    /// Current queue depth.
    pub fn size(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.size() >= self.capacity
    }
}
