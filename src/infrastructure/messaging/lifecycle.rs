//! Component Lifecycle
//!
//! Start/stop/ready state machine shared by every long-lived transport
//! component.
//!
//! ```text
//!   NotReady ──start()──> Ready ──stop()──> Closed
//!                           ^                  │
//!                           └─────start()──────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::shared::error::TransportError;

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    NotReady,
    Ready,
    Closed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotReady => "not_ready",
            Self::Ready => "ready",
            Self::Closed => "closed",
        }
    }
}

/// Start/stop contract. Both transitions are no-ops when the component is
/// already in the target state.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Acquires the underlying connection and releases readiness waiters.
    async fn start(&self) -> Result<(), TransportError>;

    /// Marks the component closed, fails readiness waiters and tears down
    /// the connection.
    async fn stop(&self) -> Result<(), TransportError>;

    fn state(&self) -> LifecycleState;

    fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Ready
    }
}

/// Readiness gate broadcasting lifecycle transitions to waiters.
#[derive(Debug)]
pub struct Readiness {
    tx: watch::Sender<LifecycleState>,
}

impl Readiness {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::NotReady);
        Self { tx }
    }

    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn set_ready(&self) {
        self.tx.send_replace(LifecycleState::Ready);
    }

    pub fn set_closed(&self) {
        self.tx.send_replace(LifecycleState::Closed);
    }

    /// Waits until the component leaves `NotReady`, for at most `timeout`.
    ///
    /// Fails with `Closed` when the component is (or becomes) closed and with
    /// `Timeout` when the bound elapses first.
    pub async fn wait(&self, timeout: Duration) -> Result<(), TransportError> {
        self.wait_until(Instant::now() + timeout, timeout).await
    }

    /// Like [`wait`](Self::wait), bounded by an absolute `deadline`. `bound`
    /// is the duration reported by a `Timeout` error.
    pub async fn wait_until(&self, deadline: Instant, bound: Duration) -> Result<(), TransportError> {
        let mut rx = self.tx.subscribe();
        let waited = tokio::time::timeout_at(
            deadline,
            rx.wait_for(|state| *state != LifecycleState::NotReady),
        )
        .await;

        match waited {
            Err(_) => Err(TransportError::Timeout(bound)),
            Ok(Err(_)) => Err(TransportError::Closed),
            Ok(Ok(state)) if *state == LifecycleState::Ready => Ok(()),
            Ok(Ok(_)) => Err(TransportError::Closed),
        }
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}
