//! Error types for the ledger module.

use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Snapshot encoding/decoding error.
    #[error("serialization error: {0}")]
    Serialization(#[from] braid_core::CoreError),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding ledger state was poisoned by a panicking writer.
    #[error("ledger lock poisoned")]
    Poisoned,

    /// The blocking task running a query failed.
    #[error("background task failed: {0}")]
    Task(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
