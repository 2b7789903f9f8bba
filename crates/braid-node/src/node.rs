//! The Node: peer lifecycle around catch-up.
//!
//! A node owns the catch-up engine and one task per connected peer. The
//! surrounding networking layer tells it when peers connect, complete the
//! gossip handshake, announce graphs, and leave.

use std::collections::HashMap;
use std::sync::Arc;

use braid_core::{NodeId, RoundGraph, RoundNumber, Snapshot, SyncPoint};
use braid_ledger::{AppendResult, Ledger, LedgerWriter};
use braid_sync::{
    peer_channel, CatchUpEngine, FinalizationSender, GossipRegistry, PeerHandle, PeerMessage, SyncError,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};

struct PeerEntry {
    handle: PeerHandle,
    task: JoinHandle<()>,
}

/// A participating node.
pub struct Node<L, S> {
    engine: Arc<CatchUpEngine<L, S>>,
    ledger: Arc<L>,
    config: NodeConfig,
    peers: Mutex<HashMap<NodeId, PeerEntry>>,
}

impl<L, S> Node<L, S>
where
    L: Ledger + 'static,
    S: FinalizationSender + 'static,
{
    /// Create a node. Fails if the sync configuration is invalid.
    pub fn new(local_id: NodeId, ledger: Arc<L>, sender: Arc<S>, config: NodeConfig) -> Result<Self> {
        let engine = CatchUpEngine::new(
            local_id,
            Arc::clone(&ledger),
            sender,
            Arc::new(GossipRegistry::new()),
            config.sync.clone(),
        )?;
        Ok(Self {
            engine: Arc::new(engine),
            ledger,
            config,
            peers: Mutex::new(HashMap::new()),
        })
    }

    pub fn local_id(&self) -> NodeId {
        self.engine.local_id()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn engine(&self) -> &Arc<CatchUpEngine<L, S>> {
        &self.engine
    }

    pub fn is_shutting_down(&self) -> bool {
        self.engine.shutdown().is_signaled()
    }

    /// The local round graph, for announcing to peers.
    pub async fn local_graph(&self) -> Result<RoundGraph> {
        Ok(self.ledger.build_graph().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Peer Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a session for `peer` and start its catch-up task.
    pub async fn connect_peer(&self, peer: NodeId) -> Result<()> {
        // Checked under the lock: `shutdown` signals before it drains, so an
        // entry inserted here is either refused or drained.
        let mut peers = self.peers.lock().await;
        if self.is_shutting_down() {
            return Err(NodeError::ShuttingDown);
        }
        if peers.contains_key(&peer) {
            return Err(NodeError::AlreadyConnected(peer));
        }

        let (handle, session) = peer_channel(peer, self.config.sync.graph_channel_capacity);
        let engine = Arc::clone(&self.engine);
        let task = tokio::spawn(async move { engine.run_peer(session).await });

        peers.insert(peer, PeerEntry { handle, task });
        info!(peer = %peer, "peer connected");
        Ok(())
    }

    /// Stop a peer's catch-up task and wait for it to finish.
    pub async fn disconnect_peer(&self, peer: &NodeId) -> Result<()> {
        let entry = self
            .peers
            .lock()
            .await
            .remove(peer)
            .ok_or(NodeError::UnknownPeer(*peer))?;

        Self::stop(entry).await?;
        info!(peer = %peer, "peer disconnected");
        Ok(())
    }

    /// Stop every peer task. New connections are refused afterwards.
    pub async fn shutdown(&self) -> Result<()> {
        self.engine.shutdown().signal();

        let entries: Vec<(NodeId, PeerEntry)> = self.peers.lock().await.drain().collect();
        let count = entries.len();

        let mut first_err = None;
        for (peer, entry) in entries {
            if let Err(e) = Self::stop(entry).await {
                tracing::warn!(peer = %peer, error = %e, "peer task did not stop cleanly");
                first_err.get_or_insert(e);
            }
        }

        info!(peers = count, "node shut down");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn stop(mut entry: PeerEntry) -> Result<()> {
        entry.handle.close();
        entry.handle.finished().await;
        entry.task.await?;
        Ok(())
    }

    /// Peers with a running session, sorted.
    pub async fn connected_peers(&self) -> Vec<NodeId> {
        let mut peers: Vec<NodeId> = self.peers.lock().await.keys().copied().collect();
        peers.sort();
        peers
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Gossip
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a completed gossip handshake with `peer`.
    pub fn establish_gossip(&self, peer: NodeId, round: RoundNumber) {
        self.engine.gossip().put(peer, round);
        debug!(peer = %peer, round, "gossip session established");
    }

    pub fn drop_gossip(&self, peer: &NodeId) {
        if self.engine.gossip().remove(peer).is_some() {
            debug!(peer = %peer, "gossip session dropped");
        }
    }

    /// Hand a peer's announced graph to its session.
    ///
    /// Returns false if the session was busy and the announcement was dropped.
    pub async fn push_round_graph(&self, peer: &NodeId, points: Vec<SyncPoint>) -> Result<bool> {
        let peers = self.peers.lock().await;
        let entry = peers.get(peer).ok_or(NodeError::UnknownPeer(*peer))?;
        Ok(entry.handle.push_graph(points)?)
    }
}

impl<L, S> Node<L, S>
where
    L: Ledger + LedgerWriter + 'static,
    S: FinalizationSender + 'static,
{
    /// Store a finalized snapshot relayed by a peer.
    pub async fn ingest_finalization(&self, snapshot: &Snapshot) -> Result<AppendResult> {
        Ok(self.ledger.append_snapshot(snapshot).await?)
    }

    /// Dispatch one inbound message from `from`.
    pub async fn handle_message(&self, from: NodeId, message: PeerMessage) -> Result<()> {
        message
            .validate_limits()
            .map_err(|e| SyncError::InvalidMessage(e.into()))?;

        match message {
            PeerMessage::RoundGraph { points } => {
                self.push_round_graph(&from, points).await?;
            }
            PeerMessage::SnapshotFinalization { snapshot } => {
                self.ingest_finalization(&snapshot).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_ledger::MemoryLedger;
    use braid_sync::RecordingSender;

    fn node_id(b: u8) -> NodeId {
        NodeId::from_bytes([b; 32])
    }

    fn make_node() -> Node<MemoryLedger, RecordingSender> {
        let mut config = NodeConfig::default();
        config.sync.snapshot_round_gap = std::time::Duration::from_millis(30);
        Node::new(
            node_id(0),
            Arc::new(MemoryLedger::new()),
            Arc::new(RecordingSender::new()),
            config,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_connect_twice_fails() {
        let node = make_node();
        node.connect_peer(node_id(1)).await.unwrap();
        assert!(matches!(
            node.connect_peer(node_id(1)).await,
            Err(NodeError::AlreadyConnected(_))
        ));
        node.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_peer() {
        let node = make_node();
        assert!(matches!(
            node.push_round_graph(&node_id(1), vec![]).await,
            Err(NodeError::UnknownPeer(_))
        ));
        assert!(matches!(
            node.disconnect_peer(&node_id(1)).await,
            Err(NodeError::UnknownPeer(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_removes_peer() {
        let node = make_node();
        node.connect_peer(node_id(2)).await.unwrap();
        node.connect_peer(node_id(1)).await.unwrap();
        assert_eq!(node.connected_peers().await, vec![node_id(1), node_id(2)]);

        node.disconnect_peer(&node_id(1)).await.unwrap();
        assert_eq!(node.connected_peers().await, vec![node_id(2)]);
        node.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_connections_after_shutdown() {
        let node = make_node();
        node.shutdown().await.unwrap();
        assert!(matches!(
            node.connect_peer(node_id(1)).await,
            Err(NodeError::ShuttingDown)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_connect_racing_shutdown_leaves_no_peer() {
        let node = Arc::new(make_node());

        let connects: Vec<_> = (1..=32)
            .map(|i| {
                let node = Arc::clone(&node);
                tokio::spawn(async move { node.connect_peer(node_id(i)).await })
            })
            .collect();
        tokio::task::yield_now().await;
        node.shutdown().await.unwrap();

        for connect in connects {
            match connect.await.unwrap() {
                Ok(()) | Err(NodeError::ShuttingDown) => {}
                Err(e) => panic!("unexpected connect error: {}", e),
            }
        }
        assert!(node.connected_peers().await.is_empty());
    }

    #[tokio::test]
    async fn test_gossip_registry_changes() {
        let node = make_node();
        node.establish_gossip(node_id(1), 4);
        assert_eq!(node.engine().gossip().get(&node_id(1)).unwrap().round, 4);
        node.drop_gossip(&node_id(1));
        assert!(node.engine().gossip().get(&node_id(1)).is_none());
    }

    #[tokio::test]
    async fn test_finalization_message_is_ingested() {
        let node = make_node();
        let snapshot = Snapshot::new(node_id(5), 3, b"tx".to_vec());
        node.handle_message(node_id(1), PeerMessage::SnapshotFinalization { snapshot })
            .await
            .unwrap();
        assert_eq!(node.local_graph().await.unwrap().round_of(&node_id(5)), 3);
    }
}
