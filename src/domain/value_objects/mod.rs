//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **Cursor**: position of an incremental outbox key sweep

mod cursor;

pub use cursor::*;
