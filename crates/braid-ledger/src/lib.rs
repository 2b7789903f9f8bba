//! # Braid Ledger
//!
//! Access to the shared, append-only log of finalized snapshots.
//!
//! ## Overview
//!
//! The sync layer only ever reads history, through the [`Ledger`] trait.
//! Backends also implement [`LedgerWriter`] so the component that finalizes
//! snapshots (and tests) can append to them.
//!
//! ## Key Types
//!
//! - [`Ledger`] - Read-only accessor, safe for concurrent readers
//! - [`LedgerWriter`] - Append and membership changes
//! - [`SqliteLedger`] - Durable SQLite backend
//! - [`MemoryLedger`] - In-memory backend for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use braid_core::{NodeId, Snapshot};
//! use braid_ledger::{Ledger, LedgerWriter, SqliteLedger};
//!
//! async fn example() {
//!     let ledger = SqliteLedger::open("ledger.db").unwrap();
//!     let node = NodeId::derive("node-a");
//!     ledger.append_snapshot(&Snapshot::new(node, 1, b"tx".to_vec())).await.unwrap();
//!     let batch = ledger.read_snapshots_since_topology(0, 200).await.unwrap();
//!     assert_eq!(batch.len(), 1);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Topological order** starts at 1 and is the replay cursor; offset 0
//!   means "from the beginning".
//! - **Idempotent appends**: the same snapshot twice returns `AlreadyExists`.
//! - **Removed members** leave the graph but their history stays replayable.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{LedgerError, Result};
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;
pub use traits::{AppendResult, Ledger, LedgerWriter};
