//! # Braid Sync
//!
//! Catch-up of lagging peers from the local ledger.
//!
//! ## Overview
//!
//! Each connected peer periodically announces its round graph: the latest
//! round it holds for every node. When a peer falls behind, the local node
//! finds the earliest point in the global topological order the peer may be
//! missing and replays finalized snapshots from there, then pushes the
//! rounds nearest each node's head directly.
//!
//! ## Key Properties
//!
//! - **Conservative**: the replay offset is the earliest candidate over all
//!   lagging nodes; re-sending history is safe, skipping it is not
//! - **Bounded**: replay runs in fixed-size batches with a pause between them
//! - **Guarded**: a snapshot implausibly far past the peer's claim halts the pass
//! - **Cooperative shutdown**: flags are polled at every loop checkpoint
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use braid_core::{NodeId, SyncPoint};
//! use braid_ledger::MemoryLedger;
//! use braid_sync::{peer_channel, CatchUpEngine, GossipRegistry, MemoryNetwork, SyncConfig};
//!
//! async fn example() {
//!     let local = NodeId::derive("local");
//!     let peer = NodeId::derive("peer");
//!     let network = MemoryNetwork::new();
//!     let sender = Arc::new(network.sender(local));
//!     let gossip = Arc::new(GossipRegistry::new());
//!     gossip.put(peer, 0);
//!
//!     let engine = Arc::new(
//!         CatchUpEngine::new(local, Arc::new(MemoryLedger::new()), sender, gossip, SyncConfig::default())
//!             .unwrap(),
//!     );
//!     let (handle, session) = peer_channel(peer, 16);
//!     tokio::spawn(async move { engine.run_peer(session).await });
//!
//!     handle.push_graph(vec![SyncPoint::new(local, 3)]).unwrap();
//! }
//! ```
//!
//! ## Loop
//!
//! ```text
//! Local                                   Peer
//!   |<------- RoundGraph ------------------|
//!   |  (wait until the peer goes quiet)    |
//!   |-------- SnapshotFinalization ------->|  streaming from offset
//!   |-------- SnapshotFinalization ------->|  ...
//!   |-------- SnapshotFinalization ------->|  head top-up
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod gossip;
pub mod graph;
pub mod head;
pub mod messages;
pub mod sender;
pub mod session;
pub mod stream;
pub mod timer;

#[cfg(test)]
mod testutil;

pub use cache::CachedLedger;
pub use config::{
    SyncConfig, DEFAULT_BATCH_LIMIT, DEFAULT_REPLAY_PAUSE, DEFAULT_SNAPSHOT_REFERENCE_THRESHOLD,
    DEFAULT_SNAPSHOT_ROUND_GAP, FUTURE_WINDOW_FACTOR, HEAD_TOPUP_MARGIN, ROUND_PROBE_LOOKAHEAD,
};
pub use engine::{AwaitOutcome, CatchUpEngine};
pub use error::{Result, SyncError};
pub use gossip::{GossipRegistry, GossipSession};
pub use messages::{limits, PeerMessage};
pub use sender::{
    memory::{Envelope, MemoryInbox, MemoryNetwork, MemorySender},
    recording::RecordingSender,
    FinalizationSender,
};
pub use session::{peer_channel, PeerHandle, PeerSession, Shutdown};
pub use stream::{BatchOutcome, Halt};
pub use timer::SyncTimer;
