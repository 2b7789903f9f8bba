//! Per-connection peer state.
//!
//! [`peer_channel`] creates the two halves of a peer connection:
//!
//! - [`PeerSession`] is owned by the peer's catch-up task. It receives the
//!   peer's announced round graphs and holds the completion notifier.
//! - [`PeerHandle`] stays with the connection owner, which pushes graphs,
//!   requests shutdown, and waits for the task to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use braid_core::{NodeId, RoundGraph, SyncPoint};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Result, SyncError};

/// A cooperative shutdown flag, polled at loop checkpoints.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Takes effect at the next checkpoint.
    pub fn signal(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_signaled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Create a connected handle/session pair for `peer_id`.
pub fn peer_channel(peer_id: NodeId, capacity: usize) -> (PeerHandle, PeerSession) {
    let (graph_tx, graph_rx) = mpsc::channel(capacity.max(1));
    let (done_tx, done_rx) = oneshot::channel();
    let closing = Shutdown::new();

    let handle = PeerHandle {
        peer_id,
        closing: closing.clone(),
        graphs: graph_tx,
        done: Some(done_rx),
    };
    let session = PeerSession {
        peer_id,
        closing,
        graphs: graph_rx,
        done: done_tx,
    };
    (handle, session)
}

/// The catch-up task's side of a peer connection.
pub struct PeerSession {
    peer_id: NodeId,
    closing: Shutdown,
    graphs: mpsc::Receiver<RoundGraph>,
    done: oneshot::Sender<()>,
}

impl PeerSession {
    pub fn peer_id(&self) -> NodeId {
        self.peer_id
    }

    /// Whether the peer side has requested shutdown.
    pub fn is_closing(&self) -> bool {
        self.closing.is_signaled()
    }

    /// Mark the peer as shutting down from the task side.
    pub fn mark_closing(&self) {
        self.closing.signal();
    }

    /// Next announced graph, or `None` once every handle is gone.
    pub async fn next_graph(&mut self) -> Option<RoundGraph> {
        self.graphs.recv().await
    }

    /// Close the completion notification. Consuming `self` makes this
    /// happen exactly once.
    pub fn close(self) {
        drop(self.done);
    }
}

/// The connection owner's side of a peer connection.
pub struct PeerHandle {
    peer_id: NodeId,
    closing: Shutdown,
    graphs: mpsc::Sender<RoundGraph>,
    /// Taken once the task is observed finished.
    done: Option<oneshot::Receiver<()>>,
}

impl PeerHandle {
    pub fn peer_id(&self) -> NodeId {
        self.peer_id
    }

    /// Deliver the peer's full announced graph.
    ///
    /// The graph is built here and handed over whole. Returns `Ok(false)` if
    /// the task is still busy with earlier pushes and this one was dropped.
    pub fn push_graph(&self, points: Vec<SyncPoint>) -> Result<bool> {
        let graph = RoundGraph::from_points(points);
        match self.graphs.try_send(graph) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(peer = %self.peer_id, "graph channel full, dropping push");
                Ok(false)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SyncError::PeerClosed(self.peer_id)),
        }
    }

    /// Request the peer's catch-up task to stop.
    pub fn close(&self) {
        self.closing.signal();
    }

    pub fn is_closing(&self) -> bool {
        self.closing.is_signaled()
    }

    /// Whether the task has finished.
    pub fn is_finished(&mut self) -> bool {
        let finished = match self.done.as_mut() {
            None => return true,
            Some(done) => !matches!(done.try_recv(), Err(oneshot::error::TryRecvError::Empty)),
        };
        if finished {
            self.done = None;
        }
        finished
    }

    /// Wait until the task has closed its completion notification.
    pub async fn finished(&mut self) {
        if let Some(done) = self.done.as_mut() {
            // The sender is only ever dropped, never used to send.
            let _ = done.await;
            self.done = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn node(b: u8) -> NodeId {
        NodeId::from_bytes([b; 32])
    }

    #[tokio::test]
    async fn test_push_delivers_whole_graph() {
        let (handle, mut session) = peer_channel(node(1), 4);
        handle
            .push_graph(vec![SyncPoint::new(node(2), 5), SyncPoint::new(node(3), 7)])
            .unwrap();

        let graph = session.next_graph().await.unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.round_of(&node(3)), 7);
    }

    #[tokio::test]
    async fn test_full_channel_drops_push() {
        let (handle, _session) = peer_channel(node(1), 1);
        assert!(handle.push_graph(vec![]).unwrap());
        assert!(!handle.push_graph(vec![]).unwrap());
    }

    #[tokio::test]
    async fn test_push_after_session_gone_errors() {
        let (handle, session) = peer_channel(node(1), 1);
        session.close();
        assert!(matches!(handle.push_graph(vec![]), Err(SyncError::PeerClosed(_))));
    }

    #[tokio::test]
    async fn test_close_flags_are_shared() {
        let (handle, session) = peer_channel(node(1), 1);
        assert!(!session.is_closing());
        handle.close();
        assert!(session.is_closing());
    }

    #[tokio::test]
    async fn test_completion_observed_once_closed() {
        let (mut handle, session) = peer_channel(node(1), 1);
        assert!(!handle.is_finished());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            session.close();
        });

        tokio::time::timeout(Duration::from_secs(1), handle.finished())
            .await
            .unwrap();
        assert!(handle.is_finished());
    }
}
