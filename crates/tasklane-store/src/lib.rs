//! Storage backends for tasklane.
//!
//! Both backends share the row logic in [`tables`]: listing joins categories,
//! deleting a task drops its recurrence, deleting a category detaches its
//! tasks, and a reorder batch is validated in full before any row changes.

/// Error types for store operations.
pub mod error;
pub mod json;
pub mod memory;
mod session;
pub mod tables;

pub use error::StoreError;
pub use json::JsonStore;
pub use memory::{MemoryStore, Operation};
pub use session::StaticSession;
pub use tables::{CategoryRow, Tables};
