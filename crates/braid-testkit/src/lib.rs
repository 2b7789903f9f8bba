//! # Braid Testkit
//!
//! Testing utilities for braid.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Canonical snapshot encodings every node must reproduce
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Ledgers with deterministic history for catch-up scenarios
//!
//! ## Golden Vectors
//!
//! ```rust
//! use braid_testkit::vectors::verify_all_vectors;
//!
//! verify_all_vectors().unwrap();
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use braid_testkit::generators::round_graph;
//!
//! proptest! {
//!     #[test]
//!     fn unknown_nodes_are_round_zero(g in round_graph(8)) {
//!         prop_assert_eq!(g.round_of(&braid_core::NodeId::from_bytes([0; 32])), 0);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use braid_testkit::fixtures::{node_id, LedgerFixture};
//!
//! let fixture = LedgerFixture::new();
//! fixture.append_rounds(&node_id(1), 0..=10).await?;
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{fast_sync_config, make_snapshot, node_id, LedgerFixture};
pub use vectors::{all_vectors, snapshot_from_vector, verify_all_vectors, GoldenVector};
