//! Outbox scan cursor.

use serde::{Deserialize, Serialize};

/// Position of an incremental key sweep.
///
/// On the wire a sweep starts and ends at token `0`; the enum keeps the two
/// meanings apart so a finished sweep is never confused with a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cursor {
    /// No page fetched yet in this sweep
    #[default]
    Start,
    /// Continue from the server-issued token
    Resume(u64),
    /// The store reported the sweep finished
    SweepComplete,
}

impl Cursor {
    /// Token to send with the next scan request.
    pub fn token(&self) -> u64 {
        match self {
            Self::Start | Self::SweepComplete => 0,
            Self::Resume(token) => *token,
        }
    }

    /// Interprets a token returned by the store.
    pub fn from_token(token: u64) -> Self {
        if token == 0 {
            Self::SweepComplete
        } else {
            Self::Resume(token)
        }
    }

    /// Cursor for the next tick: a finished sweep starts over.
    pub fn advance(self) -> Self {
        match self {
            Self::SweepComplete => Self::Start,
            other => other,
        }
    }

    pub fn is_sweep_complete(&self) -> bool {
        matches!(self, Self::SweepComplete)
    }
}
