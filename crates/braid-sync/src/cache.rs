//! Read-through cache in front of the ledger.
//!
//! A round strictly below a node's local head round can no longer change,
//! so reads of it are marked final and memoized. The head round itself may
//! still gain snapshots. Everything else goes
//! straight to the ledger.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use braid_core::{NodeId, RoundGraph, RoundNumber, SnapshotWithTopologicalOrder, TopologicalOrder};
use braid_ledger::Ledger;

use crate::error::Result;

/// A ledger accessor with a bounded cache of final round reads.
pub struct CachedLedger<L> {
    ledger: Arc<L>,
    rounds: Mutex<RoundCache>,
}

struct RoundCache {
    capacity: usize,
    entries: HashMap<(NodeId, RoundNumber), Vec<SnapshotWithTopologicalOrder>>,
    /// Insertion order, oldest first.
    order: VecDeque<(NodeId, RoundNumber)>,
}

impl RoundCache {
    fn insert(&mut self, key: (NodeId, RoundNumber), value: Vec<SnapshotWithTopologicalOrder>) {
        if self.capacity == 0 || self.entries.contains_key(&key) {
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key);
        self.entries.insert(key, value);
    }
}

impl<L: Ledger> CachedLedger<L> {
    pub fn new(ledger: Arc<L>, capacity: usize) -> Self {
        Self {
            ledger,
            rounds: Mutex::new(RoundCache {
                capacity,
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Number of memoized rounds.
    pub fn cached_rounds(&self) -> usize {
        self.rounds.lock().map(|c| c.entries.len()).unwrap_or(0)
    }

    /// Read all snapshots at `(node_id, round)`.
    ///
    /// `is_final` marks the round as immutable; only final, non-empty results
    /// are cached.
    pub async fn read_snapshots_for_node_round(
        &self,
        node_id: &NodeId,
        round: RoundNumber,
        is_final: bool,
    ) -> Result<Vec<SnapshotWithTopologicalOrder>> {
        let key = (*node_id, round);

        if is_final {
            if let Ok(cache) = self.rounds.lock() {
                if let Some(hit) = cache.entries.get(&key) {
                    return Ok(hit.clone());
                }
            }
        }

        let snapshots = self.ledger.read_snapshots_for_node_round(node_id, round).await?;

        if is_final && !snapshots.is_empty() {
            if let Ok(mut cache) = self.rounds.lock() {
                cache.insert(key, snapshots.clone());
            }
        }

        Ok(snapshots)
    }

    pub async fn read_snapshots_since_topology(
        &self,
        offset: TopologicalOrder,
        limit: usize,
    ) -> Result<Vec<SnapshotWithTopologicalOrder>> {
        Ok(self.ledger.read_snapshots_since_topology(offset, limit).await?)
    }

    pub async fn build_graph(&self) -> Result<RoundGraph> {
        Ok(self.ledger.build_graph().await?)
    }

    pub async fn read_all_nodes(&self) -> Result<Vec<NodeId>> {
        Ok(self.ledger.read_all_nodes().await?)
    }
}
