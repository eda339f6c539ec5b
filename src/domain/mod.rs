//! # Domain Layer
//!
//! Types the relays move around, independent of Redis, Kafka and MongoDB.
//!
//! ## Structure
//!
//! - **entities**: The chat message document and its repository contract
//! - **value_objects**: The outbox scan cursor
//!
//! Repository traits define data access contracts; the infrastructure layer
//! implements them.

pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use value_objects::*;
