//! # Braid Core
//!
//! Pure primitives for braid: node identifiers, snapshots, and round graphs.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`NodeId`] - Identifier of a consensus-participating node
//! - [`Snapshot`] - A finalized unit of ledger history for one (node, round)
//! - [`SnapshotWithTopologicalOrder`] - A snapshot and its global position
//! - [`SyncPoint`] - A claim that a node has reached a round
//! - [`RoundGraph`] - One party's view of every node's latest round
//!
//! ## Canonicalization
//!
//! Snapshots are encoded using deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod error;
pub mod round;
pub mod snapshot;
pub mod types;

pub use canonical::{canonical_bytes, decode_snapshot};
pub use error::CoreError;
pub use round::{RoundGraph, SyncPoint};
pub use snapshot::{Snapshot, SnapshotWithTopologicalOrder};
pub use types::{NodeId, RoundNumber, SnapshotHash, TopologicalOrder};
