//! Embedded persistence for conversations, messages, tool calls, channel
//! links, and trigger runs.
//!
//! The rest of the workspace consumes this crate through [`Store`] — a typed
//! capability object over a single SQLite file. All operations fail only
//! with [`StoreError`].

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::Store;
pub use types::*;
