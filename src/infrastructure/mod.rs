//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Broker transport (Kafka)
//! - Outbox queue (Redis)
//! - Document repository (MongoDB)
//! - Prometheus metrics

pub mod cache;
pub mod messaging;
pub mod metrics;
pub mod repositories;
