//! Error types for the sync module.

use braid_core::NodeId;
use thiserror::Error;

/// Errors that can occur during catch-up.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Ledger read failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] braid_ledger::LedgerError),

    /// Outbound delivery failed.
    #[error("transport error: {0}")]
    TransportError(String),

    /// An operation exceeded its time budget.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The peer's session is gone.
    #[error("peer closed: {0}")]
    PeerClosed(NodeId),

    /// Message validation failed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Message encoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Configuration rejected by `SyncConfig::validate`.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
