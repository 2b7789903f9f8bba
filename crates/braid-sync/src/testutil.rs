//! Shared helpers for this crate's unit tests.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use braid_core::{NodeId, RoundNumber, Snapshot, TopologicalOrder};
use braid_ledger::{Ledger, LedgerWriter, MemoryLedger};

use crate::config::SyncConfig;

pub fn node(b: u8) -> NodeId {
    NodeId::from_bytes([b; 32])
}

pub fn snap(n: u8, round: RoundNumber) -> Snapshot {
    Snapshot::new(node(n), round, format!("{}:{}", n, round).into_bytes()).with_timestamp(round)
}

/// Threshold 3 and timings short enough for tests.
pub fn fast_config() -> SyncConfig {
    SyncConfig {
        snapshot_round_gap: Duration::from_millis(30),
        snapshot_reference_threshold: 3,
        replay_pause: Duration::from_millis(1),
        ..SyncConfig::default()
    }
}

/// A memory ledger plus lookups by (node, round).
pub struct TestLedger {
    pub inner: Arc<MemoryLedger>,
}

impl TestLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryLedger::new()),
        }
    }

    /// Append one snapshot per round, node by node in the given order.
    pub async fn rounds(plan: &[(u8, RangeInclusive<RoundNumber>)]) -> Self {
        let ledger = Self::new();
        for (n, rounds) in plan {
            for round in rounds.clone() {
                ledger.append(*n, round).await;
            }
        }
        ledger
    }

    pub async fn append(&self, n: u8, round: RoundNumber) -> TopologicalOrder {
        self.inner.append_snapshot(&snap(n, round)).await.unwrap().order()
    }

    /// Topological order of the first snapshot at (node, round).
    pub async fn order_of(&self, n: u8, round: RoundNumber) -> TopologicalOrder {
        self.inner
            .read_snapshots_for_node_round(&node(n), round)
            .await
            .unwrap()[0]
            .topological_order
    }
}
