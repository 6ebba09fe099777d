//! Error types for policy synchronization

use thiserror::Error;

/// Policy synchronization errors
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Lock could not be acquired, even after removing a stale token
    #[error("Lock '{lock_id}' not acquired after {waited_ms}ms (stale-token removal included)")]
    LockTimeout { lock_id: String, waited_ms: u64 },

    /// Store unreachable or malformed during read
    #[error("Store read failed: {0}")]
    StoreRead(String),

    /// Store rejected or failed the merge-patch
    #[error("Store write failed: {0}")]
    StoreWrite(String),

    /// Lock token or store object could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for synchronization operations
pub type Result<T> = std::result::Result<T, SyncError>;
