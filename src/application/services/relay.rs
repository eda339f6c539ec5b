//! Relay service contract shared by both pipelines.

use async_trait::async_trait;

use crate::infrastructure::messaging::{Headers, LifecycleState};
use crate::shared::error::RelayError;

/// Version tag carried in relay headers.
pub const RELAY_VERSION: &str = "1.0";

/// Outcome of one relay tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Records moved to the next system
    pub handled: usize,
    /// Records that failed and stay queued for a later tick
    pub failed: usize,
    /// Records dropped as unusable (empty or malformed)
    pub skipped: usize,
}

impl TickSummary {
    pub fn is_idle(&self) -> bool {
        self.handled == 0 && self.failed == 0 && self.skipped == 0
    }
}

/// A relay driven by an external scheduler: `start`, then `process` a
/// number of times, then `stop`.
///
/// `process` takes `&mut self`, so ticks on one instance never overlap.
#[async_trait]
pub trait RelayService: Send {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Acquires transport resources. No-op when already started.
    async fn start(&mut self) -> Result<(), RelayError>;

    /// Releases transport resources. Shutdown errors are logged, not returned.
    async fn stop(&mut self);

    /// Runs one tick. No-op unless started.
    async fn process(&mut self) -> Result<TickSummary, RelayError>;

    fn state(&self) -> LifecycleState;
}

/// Builds the `source`/`service`/`version` headers stamped on relayed records.
pub fn relay_headers(source: &str, service: &str) -> Headers {
    vec![
        ("source".to_owned(), source.as_bytes().to_vec()),
        ("service".to_owned(), service.as_bytes().to_vec()),
        ("version".to_owned(), RELAY_VERSION.as_bytes().to_vec()),
    ]
}
