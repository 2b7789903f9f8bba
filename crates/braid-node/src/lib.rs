//! # Braid Node
//!
//! The node-level API for braid: ledger, catch-up and peer lifecycle.
//!
//! ## Overview
//!
//! A [`Node`] runs one catch-up task per connected peer. The networking
//! layer around it reports connections, gossip handshakes and inbound
//! messages; the node replays finalized history to peers that fall behind.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use braid_node::{Node, NodeConfig};
//! use braid_node::core::NodeId;
//! use braid_node::ledger::SqliteLedger;
//! use braid_node::sync::MemoryNetwork;
//!
//! async fn example() {
//!     let local = NodeId::derive("node-a");
//!     let peer = NodeId::derive("node-b");
//!
//!     let ledger = Arc::new(SqliteLedger::open("ledger.db").unwrap());
//!     let network = MemoryNetwork::new();
//!     let sender = Arc::new(network.sender(local));
//!     let config = NodeConfig::load("node.json").unwrap();
//!
//!     let node = Node::new(local, ledger, sender, config).unwrap();
//!     node.connect_peer(peer).await.unwrap();
//!     node.establish_gossip(peer, 0);
//!
//!     // ... feed inbound messages with node.handle_message(from, message)
//!
//!     node.shutdown().await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `braid_node::core` - Core primitives (NodeId, Snapshot, RoundGraph)
//! - `braid_node::ledger` - Ledger accessor and backends
//! - `braid_node::sync` - Catch-up engine

pub mod config;
pub mod error;
pub mod node;

pub use braid_core as core;
pub use braid_ledger as ledger;
pub use braid_sync as sync;

pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use node::Node;

pub use braid_core::{NodeId, RoundGraph, RoundNumber, Snapshot, SyncPoint, TopologicalOrder};
