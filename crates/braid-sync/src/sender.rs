//! Outbound delivery of finalization messages.
//!
//! The transport itself is external. Catch-up only needs to hand one snapshot
//! to one peer and learn whether that failed.

use async_trait::async_trait;

use braid_core::{NodeId, Snapshot};

use crate::error::Result;

/// Sends finalization messages to peers.
///
/// Implementations must be thread-safe: every peer's catch-up task shares one.
#[async_trait]
pub trait FinalizationSender: Send + Sync {
    /// Deliver `snapshot` to `peer`. Best effort; failure is returned.
    async fn send_finalization(&self, peer: &NodeId, snapshot: &Snapshot) -> Result<()>;
}

/// A sender that records every delivery. Used by tests.
pub mod recording {
    use super::*;
    use std::sync::Mutex;

    use crate::error::SyncError;

    #[derive(Default)]
    pub struct RecordingSender {
        sent: Mutex<Vec<(NodeId, Snapshot)>>,
        /// Fail every send once this many have succeeded.
        fail_after: Option<usize>,
    }

    impl RecordingSender {
        pub fn new() -> Self {
            Self::default()
        }

        /// A sender whose first `n` sends succeed and the rest fail.
        pub fn failing_after(n: usize) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_after: Some(n),
            }
        }

        /// Everything sent so far, in order.
        pub fn sent(&self) -> Vec<(NodeId, Snapshot)> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }

        /// Snapshots sent to one peer, in order.
        pub fn sent_to(&self, peer: &NodeId) -> Vec<Snapshot> {
            self.sent()
                .into_iter()
                .filter(|(p, _)| p == peer)
                .map(|(_, s)| s)
                .collect()
        }

        pub fn clear(&self) {
            if let Ok(mut sent) = self.sent.lock() {
                sent.clear();
            }
        }
    }

    #[async_trait]
    impl FinalizationSender for RecordingSender {
        async fn send_finalization(&self, peer: &NodeId, snapshot: &Snapshot) -> Result<()> {
            let mut sent = self
                .sent
                .lock()
                .map_err(|_| SyncError::TransportError("recorder poisoned".into()))?;
            if let Some(limit) = self.fail_after {
                if sent.len() >= limit {
                    return Err(SyncError::TransportError("injected failure".into()));
                }
            }
            sent.push((*peer, snapshot.clone()));
            Ok(())
        }
    }
}

/// A simple in-memory network.
///
/// Uses channels to simulate message passing between nodes.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{mpsc, RwLock};

    use crate::error::SyncError;
    use crate::messages::PeerMessage;

    /// Message envelope for internal routing.
    #[derive(Debug, Clone)]
    pub struct Envelope {
        pub from: NodeId,
        pub message: PeerMessage,
    }

    /// Shared routing table for the memory network.
    #[derive(Default)]
    pub struct MemoryNetwork {
        inboxes: RwLock<HashMap<NodeId, mpsc::Sender<Envelope>>>,
    }

    impl MemoryNetwork {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Register `node_id` and return its inbox.
        pub async fn join(self: &Arc<Self>, node_id: NodeId) -> MemoryInbox {
            let (tx, rx) = mpsc::channel(1000);
            self.inboxes.write().await.insert(node_id, tx);
            MemoryInbox { node_id, rx }
        }

        /// Unregister a node; later sends to it fail.
        pub async fn leave(&self, node_id: &NodeId) {
            self.inboxes.write().await.remove(node_id);
        }

        /// A sender that stamps messages as coming from `node_id`.
        pub fn sender(self: &Arc<Self>, node_id: NodeId) -> MemorySender {
            MemorySender {
                node_id,
                network: Arc::clone(self),
            }
        }

        async fn deliver(&self, from: NodeId, to: &NodeId, message: PeerMessage) -> Result<()> {
            message
                .validate_limits()
                .map_err(|e| SyncError::InvalidMessage(e.into()))?;
            let inboxes = self.inboxes.read().await;
            let inbox = inboxes
                .get(to)
                .ok_or_else(|| SyncError::TransportError("peer not found".into()))?;
            inbox
                .send(Envelope { from, message })
                .await
                .map_err(|_| SyncError::TransportError("peer disconnected".into()))
        }
    }

    /// Sending side bound to one local node.
    #[derive(Clone)]
    pub struct MemorySender {
        node_id: NodeId,
        network: Arc<MemoryNetwork>,
    }

    impl MemorySender {
        /// Announce the local round graph to a peer.
        pub async fn send_graph(&self, peer: &NodeId, points: Vec<braid_core::SyncPoint>) -> Result<()> {
            self.network
                .deliver(self.node_id, peer, PeerMessage::RoundGraph { points })
                .await
        }
    }

    #[async_trait]
    impl FinalizationSender for MemorySender {
        async fn send_finalization(&self, peer: &NodeId, snapshot: &Snapshot) -> Result<()> {
            let message = PeerMessage::SnapshotFinalization {
                snapshot: snapshot.clone(),
            };
            self.network.deliver(self.node_id, peer, message).await
        }
    }

    /// Receiving side of one node.
    pub struct MemoryInbox {
        node_id: NodeId,
        rx: mpsc::Receiver<Envelope>,
    }

    impl MemoryInbox {
        pub fn node_id(&self) -> NodeId {
            self.node_id
        }

        pub async fn recv(&mut self) -> Result<Envelope> {
            self.rx
                .recv()
                .await
                .ok_or_else(|| SyncError::TransportError("channel closed".into()))
        }

        /// Receive with timeout. Returns None if nothing arrives in time.
        pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Envelope>> {
            match tokio::time::timeout(timeout, self.rx.recv()).await {
                Ok(Some(envelope)) => Ok(Some(envelope)),
                Ok(None) => Err(SyncError::TransportError("channel closed".into())),
                Err(_) => Ok(None),
            }
        }

        /// Everything currently queued, without waiting.
        pub fn drain(&mut self) -> Vec<Envelope> {
            let mut out = Vec::new();
            while let Ok(envelope) = self.rx.try_recv() {
                out.push(envelope);
            }
            out
        }
    }
}
