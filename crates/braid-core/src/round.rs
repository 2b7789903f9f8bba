//! Round graphs: one party's view of how far every node has progressed.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{NodeId, RoundNumber};

/// A claim that `node_id` has reached round `number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncPoint {
    pub node_id: NodeId,
    pub number: RoundNumber,
}

impl SyncPoint {
    pub const fn new(node_id: NodeId, number: RoundNumber) -> Self {
        Self { node_id, number }
    }
}

/// Mapping from node to its latest known round.
///
/// A round graph is immutable once built. A peer's graph is never patched in
/// place: a new announcement builds a new graph and the holder swaps it in.
/// Clones share the underlying map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundGraph {
    points: Arc<HashMap<NodeId, SyncPoint>>,
}

impl RoundGraph {
    /// Build a graph from a list of points. A later point for the same node
    /// replaces an earlier one.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = SyncPoint>,
    {
        let map: HashMap<NodeId, SyncPoint> =
            points.into_iter().map(|p| (p.node_id, p)).collect();
        Self {
            points: Arc::new(map),
        }
    }

    /// Look up the point for a node.
    pub fn get(&self, node_id: &NodeId) -> Option<&SyncPoint> {
        self.points.get(node_id)
    }

    /// The round claimed for a node, zero if the node is unknown.
    pub fn round_of(&self, node_id: &NodeId) -> RoundNumber {
        self.points.get(node_id).map(|p| p.number).unwrap_or(0)
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.points.contains_key(node_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncPoint> {
        self.points.values()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All points, sorted by node ID for stable output.
    pub fn points(&self) -> Vec<SyncPoint> {
        let mut points: Vec<SyncPoint> = self.points.values().copied().collect();
        points.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        points
    }
}

impl FromIterator<SyncPoint> for RoundGraph {
    fn from_iter<I: IntoIterator<Item = SyncPoint>>(iter: I) -> Self {
        Self::from_points(iter)
    }
}
