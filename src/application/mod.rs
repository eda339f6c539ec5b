//! Application Layer
//!
//! Relay services orchestrating the flow of chat messages from the outbox,
//! through the broker, into the document store.

pub mod services;
