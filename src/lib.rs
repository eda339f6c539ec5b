//! # Chat Relay Library
//!
//! This crate provides the message-transport and relay layer of a chat
//! backend:
//! - A broker transport with lifecycle-gated producer/consumer channels
//! - A bounded producer buffer with non-blocking backpressure
//! - A Redis outbox drained into Kafka
//! - A Kafka consumer persisting chat messages into MongoDB
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Chat message documents, the scan cursor and repository traits
//! - **Application Layer**: Relay services
//! - **Infrastructure Layer**: Broker transport, Redis outbox, MongoDB repository, metrics
//!
//! ## Module Structure
//!
//! ```text
//! chat_relay/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities, value objects, and traits
//! +-- application/    Relay services
//! +-- infrastructure/ Messaging, cache, repository and metrics implementations
//! +-- shared/         Common utilities (errors)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Relay services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Shared utilities
pub mod shared;

// Relay wiring and job runner
pub mod startup;

// Telemetry and observability
pub mod telemetry;
