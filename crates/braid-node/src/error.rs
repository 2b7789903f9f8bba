//! Error types for the node.

use braid_core::NodeId;
use braid_ledger::LedgerError;
use braid_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Catch-up error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// No session for this peer.
    #[error("unknown peer: {0}")]
    UnknownPeer(NodeId),

    /// A session for this peer already exists.
    #[error("peer already connected: {0}")]
    AlreadyConnected(NodeId),

    /// The node is shutting down.
    #[error("node is shutting down")]
    ShuttingDown,

    /// A peer task panicked or was cancelled.
    #[error("peer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
