//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use braid_core::{NodeId, RoundGraph, RoundNumber, Snapshot, TopologicalOrder};
use braid_ledger::{Ledger, LedgerWriter, MemoryLedger, Result};
use braid_sync::SyncConfig;

/// Deterministic node ID for index `i`.
pub fn node_id(i: u8) -> NodeId {
    NodeId::derive(&format!("testkit-node-{}", i))
}

/// A deterministic snapshot for (node, round).
pub fn make_snapshot(node: &NodeId, round: RoundNumber) -> Snapshot {
    Snapshot::new(*node, round, format!("{}@{}", node.to_hex(), round).into_bytes()).with_timestamp(round)
}

/// Sync settings with short waits: 30ms round gap, threshold 3, 1ms pause.
pub fn fast_sync_config() -> SyncConfig {
    SyncConfig {
        snapshot_round_gap: Duration::from_millis(30),
        snapshot_reference_threshold: 3,
        replay_pause: Duration::from_millis(1),
        ..SyncConfig::default()
    }
}

/// A test fixture with a memory ledger.
pub struct LedgerFixture {
    pub ledger: Arc<MemoryLedger>,
}

impl LedgerFixture {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(MemoryLedger::new()),
        }
    }

    /// Append one snapshot per round for `node`.
    pub async fn append_rounds(
        &self,
        node: &NodeId,
        rounds: RangeInclusive<RoundNumber>,
    ) -> Result<Vec<TopologicalOrder>> {
        let mut orders = Vec::new();
        for round in rounds {
            orders.push(self.ledger.append_snapshot(&make_snapshot(node, round)).await?.order());
        }
        Ok(orders)
    }

    /// Append rounds for several nodes, interleaved round by round.
    pub async fn append_interleaved(&self, nodes: &[NodeId], rounds: RangeInclusive<RoundNumber>) -> Result<()> {
        for round in rounds {
            for node in nodes {
                self.ledger.append_snapshot(&make_snapshot(node, round)).await?;
            }
        }
        Ok(())
    }

    pub async fn graph(&self) -> Result<RoundGraph> {
        self.ledger.build_graph().await
    }
}

impl Default for LedgerFixture {
    fn default() -> Self {
        Self::new()
    }
}
