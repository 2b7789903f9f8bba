//! Proptest generators for property-based testing.

use proptest::prelude::*;

use braid_core::{NodeId, RoundGraph, RoundNumber, Snapshot, SyncPoint};

/// Generate a random NodeId.
pub fn node_id() -> impl Strategy<Value = NodeId> {
    any::<[u8; 32]>().prop_map(NodeId::from_bytes)
}

/// Generate a round number below `max`.
pub fn round(max: RoundNumber) -> impl Strategy<Value = RoundNumber> {
    0..max
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

pub fn sync_point() -> impl Strategy<Value = SyncPoint> {
    (node_id(), round(1_000)).prop_map(|(node, number)| SyncPoint::new(node, number))
}

/// Generate a round graph over up to `max_nodes` nodes.
pub fn round_graph(max_nodes: usize) -> impl Strategy<Value = RoundGraph> {
    prop::collection::vec(sync_point(), 0..=max_nodes).prop_map(RoundGraph::from_points)
}

pub fn snapshot() -> impl Strategy<Value = Snapshot> {
    (node_id(), any::<u64>(), any::<u64>(), payload(256))
        .prop_map(|(node, round, timestamp, payload)| Snapshot::new(node, round, payload).with_timestamp(timestamp))
}
