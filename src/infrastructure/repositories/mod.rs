//! Repository Implementations
//!
//! MongoDB implementation of the domain repository trait.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use crate::infrastructure::repositories::MongoMessageRepository;
//!
//! async fn setup_repository(settings: &MongoSettings) {
//!     let repository = MongoMessageRepository::connect(settings).await?;
//! }
//! ```

pub mod message_repository;

pub use message_repository::MongoMessageRepository;
