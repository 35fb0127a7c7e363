//! Error types for tasklane store operations.

use std::path::PathBuf;

use tasklane_core::{CategoryId, TaskId};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Task does not exist.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// Category does not exist.
    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),

    /// The task already owns a recurrence row.
    #[error("Task {0} already has a recurrence")]
    RecurrenceExists(TaskId),

    /// The task has no recurrence row to update.
    #[error("Task {0} has no recurrence")]
    RecurrenceMissing(TaskId),

    /// Failure armed through [`crate::MemoryStore::fail_next`].
    #[error("Injected failure in {0}")]
    Injected(crate::Operation),

    /// Reading or writing the data file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The data file is not valid JSON.
    #[error("Failed to parse {path}: {source}")]
    Corrupt {
        /// File being parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the tables failed.
    #[error("Failed to serialize tables: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Replacing the data file failed.
    #[error("Failed to persist {path}: {source}")]
    Persist {
        /// Destination file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: tempfile::PersistError,
    },
}

/// Result alias for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
