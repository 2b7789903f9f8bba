//! Ledger traits: the read-only accessor the sync layer consumes, and the
//! write side owned by whoever persists finalized snapshots.

use async_trait::async_trait;
use braid_core::{
    NodeId, RoundGraph, RoundNumber, Snapshot, SnapshotWithTopologicalOrder, TopologicalOrder,
};

use crate::error::Result;

/// Result of appending a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendResult {
    /// Snapshot was new and received this topological order.
    Appended(TopologicalOrder),
    /// The exact snapshot was already present (idempotent - not an error).
    AlreadyExists(TopologicalOrder),
}

impl AppendResult {
    /// The topological order of the snapshot, new or existing.
    pub fn order(&self) -> TopologicalOrder {
        match self {
            AppendResult::Appended(o) | AppendResult::AlreadyExists(o) => *o,
        }
    }
}

/// Read-only view over the shared, append-only ledger.
///
/// Implementations must be safe for concurrent readers: one catch-up task per
/// peer reads through the same accessor.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// The local round graph: one entry per active member, carrying the
    /// highest round that has at least one snapshot (zero if none).
    async fn build_graph(&self) -> Result<RoundGraph>;

    /// Active members, sorted and deduplicated.
    async fn read_all_nodes(&self) -> Result<Vec<NodeId>>;

    /// All snapshots at exactly `(node_id, round)`, in topological order.
    ///
    /// Returns an empty vector if the round has no snapshots yet.
    async fn read_snapshots_for_node_round(
        &self,
        node_id: &NodeId,
        round: RoundNumber,
    ) -> Result<Vec<SnapshotWithTopologicalOrder>>;

    /// Up to `limit` snapshots with topological order strictly greater than
    /// `offset`, ascending.
    async fn read_snapshots_since_topology(
        &self,
        offset: TopologicalOrder,
        limit: usize,
    ) -> Result<Vec<SnapshotWithTopologicalOrder>>;
}

/// Write side of a ledger backend.
///
/// The sync layer never calls this; it exists for the component that
/// finalizes snapshots, and for tests.
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Append a finalized snapshot.
    ///
    /// Appending the same snapshot twice returns `AlreadyExists` with the
    /// original order. A snapshot for a never-seen node registers that node
    /// as a member.
    async fn append_snapshot(&self, snapshot: &Snapshot) -> Result<AppendResult>;

    /// Add a node to the membership (re-activates a removed node).
    async fn add_node(&self, node_id: &NodeId) -> Result<()>;

    /// Remove a node from the membership. Its snapshots stay in the log.
    async fn remove_node(&self, node_id: &NodeId) -> Result<()>;
}
