//! End-to-end catch-up between nodes over the in-memory network.

use std::sync::Arc;
use std::time::Duration;

use braid_ledger::MemoryLedger;
use braid_node::sync::{MemoryInbox, MemoryNetwork, MemorySender, PeerMessage};
use braid_node::{Node, NodeConfig, NodeId};
use braid_testkit::{fast_sync_config, node_id, LedgerFixture};
use tokio::time::{sleep, Instant};

type TestNode = Node<MemoryLedger, MemorySender>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn config() -> NodeConfig {
    NodeConfig {
        sync: fast_sync_config(),
    }
}

async fn spawn_node(network: &Arc<MemoryNetwork>, id: NodeId, ledger: Arc<MemoryLedger>) -> (Arc<TestNode>, MemoryInbox) {
    let inbox = network.join(id).await;
    let node = Node::new(id, ledger, Arc::new(network.sender(id)), config()).unwrap();
    (Arc::new(node), inbox)
}

/// Feed everything arriving in `inbox` to `node` until the inbox closes.
fn pump(node: Arc<TestNode>, mut inbox: MemoryInbox) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Ok(envelope) = inbox.recv().await {
            let _ = node.handle_message(envelope.from, envelope.message).await;
        }
    })
}

#[tokio::test]
async fn lagging_node_converges() {
    init_tracing();
    let network = MemoryNetwork::new();
    let producers = [node_id(1), node_id(2), node_id(3)];

    let ahead = LedgerFixture::new();
    ahead.append_interleaved(&producers, 0..=30).await.unwrap();
    let behind = LedgerFixture::new();
    behind.append_interleaved(&producers[..2], 0..=4).await.unwrap();

    let a_id = node_id(100);
    let b_id = node_id(200);
    let (a, a_inbox) = spawn_node(&network, a_id, ahead.ledger.clone()).await;
    let (b, b_inbox) = spawn_node(&network, b_id, behind.ledger.clone()).await;
    let _a_pump = pump(Arc::clone(&a), a_inbox);
    let _b_pump = pump(Arc::clone(&b), b_inbox);

    a.connect_peer(b_id).await.unwrap();
    a.establish_gossip(b_id, 0);

    let target = a.local_graph().await.unwrap();
    let announcer = network.sender(b_id);
    let deadline = Instant::now() + Duration::from_secs(10);

    loop {
        let graph = b.local_graph().await.unwrap();
        if graph == target {
            break;
        }
        assert!(Instant::now() < deadline, "lagging node stuck at {:?}", graph.points());

        // Announce, then stay quiet longer than the graph wait so A acts on it.
        announcer.send_graph(&a_id, graph.points()).await.unwrap();
        sleep(a.config().sync.graph_wait() * 4).await;
    }

    assert_eq!(behind.ledger.len(), ahead.ledger.len());
    a.shutdown().await.unwrap();
}

#[tokio::test]
async fn no_replay_without_gossip_session() {
    init_tracing();
    let network = MemoryNetwork::new();

    let ahead = LedgerFixture::new();
    ahead.append_rounds(&node_id(1), 0..=10).await.unwrap();

    let a_id = node_id(100);
    let b_id = node_id(200);
    let (a, _a_inbox) = spawn_node(&network, a_id, ahead.ledger.clone()).await;
    let mut b_inbox = network.join(b_id).await;

    a.connect_peer(b_id).await.unwrap();
    a.push_round_graph(&b_id, vec![]).await.unwrap();
    sleep(a.config().sync.graph_wait() * 4).await;
    assert!(b_inbox.drain().is_empty());

    // Once the handshake completes, the next announcement is acted on.
    a.establish_gossip(b_id, 0);
    a.push_round_graph(&b_id, vec![]).await.unwrap();
    let envelope = b_inbox
        .recv_timeout(Duration::from_secs(2))
        .await
        .unwrap()
        .expect("finalization after gossip established");
    assert!(matches!(envelope.message, PeerMessage::SnapshotFinalization { .. }));

    a.shutdown().await.unwrap();
}

#[tokio::test]
async fn peer_ahead_receives_nothing() {
    init_tracing();
    let network = MemoryNetwork::new();

    let ahead = LedgerFixture::new();
    ahead.append_rounds(&node_id(1), 0..=5).await.unwrap();

    let a_id = node_id(100);
    let b_id = node_id(200);
    let (a, _a_inbox) = spawn_node(&network, a_id, ahead.ledger.clone()).await;
    let mut b_inbox = network.join(b_id).await;

    a.connect_peer(b_id).await.unwrap();
    a.establish_gossip(b_id, 0);
    a.push_round_graph(&b_id, vec![braid_node::SyncPoint::new(node_id(1), 9)])
        .await
        .unwrap();

    sleep(a.config().sync.graph_wait() * 4).await;
    assert!(b_inbox.drain().is_empty());
    a.shutdown().await.unwrap();
}

#[tokio::test]
async fn disconnect_completes_exactly_once() {
    init_tracing();
    let network = MemoryNetwork::new();
    let a_id = node_id(100);
    let (a, _a_inbox) = spawn_node(&network, a_id, Arc::new(MemoryLedger::new())).await;

    for peer in [node_id(1), node_id(2), node_id(3)] {
        a.connect_peer(peer).await.unwrap();
    }
    tokio::time::timeout(Duration::from_secs(2), a.disconnect_peer(&node_id(2)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a.connected_peers().await.len(), 2);

    // Reconnecting after a clean disconnect opens a fresh session.
    a.connect_peer(node_id(2)).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), a.shutdown())
        .await
        .unwrap()
        .unwrap();
    assert!(a.connected_peers().await.is_empty());
    assert!(a.connect_peer(node_id(4)).await.is_err());
}

#[tokio::test]
async fn config_file_drives_node() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("node.json");
    std::fs::write(&path, r#"{"sync": {"snapshot_round_gap": 90, "snapshot_reference_threshold": 2}}"#).unwrap();

    let config = NodeConfig::load(&path).unwrap();
    let node = Node::new(
        node_id(1),
        Arc::new(MemoryLedger::new()),
        Arc::new(braid_node::sync::RecordingSender::new()),
        config,
    )
    .unwrap();
    assert_eq!(node.config().sync.graph_wait(), Duration::from_millis(30));
    assert_eq!(node.engine().config().snapshot_reference_threshold, 2);
}
