//! Shared Utilities
//!
//! Error types used across all layers.

pub mod error;
