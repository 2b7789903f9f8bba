//! In-memory implementation of the ledger traits.
//!
//! Same semantics as SQLite but keeps everything in memory with no
//! persistence. Used by tests and by embedders that hold history elsewhere.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use braid_core::{
    NodeId, RoundGraph, RoundNumber, Snapshot, SnapshotHash, SnapshotWithTopologicalOrder,
    SyncPoint, TopologicalOrder,
};

use crate::error::{LedgerError, Result};
use crate::traits::{AppendResult, Ledger, LedgerWriter};

/// In-memory ledger.
///
/// All data is lost when the ledger is dropped. Thread-safe via RwLock.
pub struct MemoryLedger {
    inner: RwLock<MemoryLedgerInner>,
}

#[derive(Default)]
struct MemoryLedgerInner {
    /// The global log, keyed by topological order.
    log: BTreeMap<TopologicalOrder, Snapshot>,

    /// Round index: (node, round) -> orders, ascending.
    rounds: HashMap<(NodeId, RoundNumber), Vec<TopologicalOrder>>,

    /// Content index for idempotent appends.
    hashes: HashMap<SnapshotHash, TopologicalOrder>,

    /// Membership: node -> active.
    members: BTreeMap<NodeId, bool>,

    /// Highest round seen per node.
    heads: HashMap<NodeId, RoundNumber>,

    /// Last assigned topological order.
    last_order: TopologicalOrder,
}

impl MemoryLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryLedgerInner::default()),
        }
    }

    /// Number of snapshots in the log.
    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryLedgerInner>> {
        self.inner.read().map_err(|_| LedgerError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryLedgerInner>> {
        self.inner.write().map_err(|_| LedgerError::Poisoned)
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn build_graph(&self) -> Result<RoundGraph> {
        let inner = self.read()?;
        Ok(inner
            .members
            .iter()
            .filter(|(_, active)| **active)
            .map(|(node_id, _)| {
                SyncPoint::new(*node_id, inner.heads.get(node_id).copied().unwrap_or(0))
            })
            .collect())
    }

    async fn read_all_nodes(&self) -> Result<Vec<NodeId>> {
        let inner = self.read()?;
        Ok(inner
            .members
            .iter()
            .filter(|(_, active)| **active)
            .map(|(node_id, _)| *node_id)
            .collect())
    }

    async fn read_snapshots_for_node_round(
        &self,
        node_id: &NodeId,
        round: RoundNumber,
    ) -> Result<Vec<SnapshotWithTopologicalOrder>> {
        let inner = self.read()?;
        let Some(orders) = inner.rounds.get(&(*node_id, round)) else {
            return Ok(Vec::new());
        };

        orders
            .iter()
            .map(|order| {
                inner
                    .log
                    .get(order)
                    .map(|s| SnapshotWithTopologicalOrder::new(s.clone(), *order))
                    .ok_or_else(|| {
                        LedgerError::InvalidData(format!("round index points at missing order {}", order))
                    })
            })
            .collect()
    }

    async fn read_snapshots_since_topology(
        &self,
        offset: TopologicalOrder,
        limit: usize,
    ) -> Result<Vec<SnapshotWithTopologicalOrder>> {
        let inner = self.read()?;
        Ok(inner
            .log
            .range(offset.saturating_add(1)..)
            .take(limit)
            .map(|(order, s)| SnapshotWithTopologicalOrder::new(s.clone(), *order))
            .collect())
    }
}

#[async_trait]
impl LedgerWriter for MemoryLedger {
    async fn append_snapshot(&self, snapshot: &Snapshot) -> Result<AppendResult> {
        let hash = snapshot.compute_hash();
        let mut inner = self.write()?;

        if let Some(&existing) = inner.hashes.get(&hash) {
            return Ok(AppendResult::AlreadyExists(existing));
        }

        inner.last_order += 1;
        let order = inner.last_order;

        inner.log.insert(order, snapshot.clone());
        inner.hashes.insert(hash, order);
        inner
            .rounds
            .entry((snapshot.node_id, snapshot.round_number))
            .or_default()
            .push(order);
        inner.members.entry(snapshot.node_id).or_insert(true);

        let head = inner.heads.entry(snapshot.node_id).or_insert(0);
        if snapshot.round_number > *head {
            *head = snapshot.round_number;
        }

        Ok(AppendResult::Appended(order))
    }

    async fn add_node(&self, node_id: &NodeId) -> Result<()> {
        let mut inner = self.write()?;
        inner.members.insert(*node_id, true);
        Ok(())
    }

    async fn remove_node(&self, node_id: &NodeId) -> Result<()> {
        let mut inner = self.write()?;
        inner.members.insert(*node_id, false);
        Ok(())
    }
}
