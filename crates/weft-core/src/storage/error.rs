//! Error types for settings storage

use thiserror::Error;

/// Errors from the settings store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying storage I/O failed.
    #[error("storage i/o failed: {0}")]
    Io(String),

    /// A stored record could not be encoded or decoded.
    #[error("record serialization failed: {0}")]
    Serialization(String),
}
