//! # Domain Entities
//!
//! - **NewChatMessage**: A chat message as written by producers to the outbox
//! - **StoredChatMessage**: The same message once persisted, with its id
//!
//! ## Repository Traits
//!
//! [`MessageRepository`] is implemented in the infrastructure layer.

mod chat_message;

pub use chat_message::*;
