//! Delivery Futures
//!
//! Single-resolution completion handles pairing a pending message with the
//! caller waiting on its publish outcome.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::trace;

use super::record::{PendingMessage, RecordMetadata};
use crate::shared::error::TransportError;

/// Outcome of a publish.
pub type DeliveryResult = Result<RecordMetadata, TransportError>;

/// Resolving half of a delivery: owns the pending message until the
/// channel settles it.
///
/// Resolution consumes the handle, so a message settles at most once.
/// Dropping it unresolved settles the caller side with
/// [`TransportError::Abandoned`].
pub struct FutureMessage {
    message: PendingMessage,
    tx: oneshot::Sender<DeliveryResult>,
}

impl FutureMessage {
    /// Wraps a pending message, returning the handle and the caller's future.
    pub fn new(message: PendingMessage) -> (Self, DeliveryFuture) {
        let (tx, rx) = oneshot::channel();
        (Self { message, tx }, DeliveryFuture { rx })
    }

    pub fn message(&self) -> &PendingMessage {
        &self.message
    }

    /// Settles the delivery.
    pub fn resolve(self, result: DeliveryResult) {
        if self.tx.send(result).is_err() {
            trace!(topic = %self.message.topic(), "Delivery result dropped by caller");
        }
    }

    pub fn set_result(self, metadata: RecordMetadata) {
        self.resolve(Ok(metadata));
    }

    pub fn set_error(self, error: TransportError) {
        self.resolve(Err(error));
    }
}

impl fmt::Debug for FutureMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureMessage")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Caller half of a delivery. Awaiting it yields the publish outcome.
///
/// Callers may also drop it to fire and forget.
#[derive(Debug)]
pub struct DeliveryFuture {
    rx: oneshot::Receiver<DeliveryResult>,
}

impl DeliveryFuture {
    /// Returns the outcome if it is already known, without waiting.
    pub fn try_result(&mut self) -> Option<DeliveryResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(TransportError::Abandoned)),
        }
    }
}

impl Future for DeliveryFuture {
    type Output = DeliveryResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TransportError::Abandoned)))
    }
}
