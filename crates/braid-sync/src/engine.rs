//! The per-peer catch-up loop.
//!
//! Each connected peer gets one task running [`CatchUpEngine::run_peer`]:
//!
//! ```text
//!   AwaitGraph --(timeout)--> [gossip session?] --no--> AwaitGraph
//!                                   |
//!                                  yes
//!                                   v
//!                     Streaming (sync_since until EOF/FUTURE)
//!                                   |
//!                                   v
//!                     ToppingUp (head rounds, every node)
//!                                   |
//!                                   v
//!                               AwaitGraph
//! ```
//!
//! Either shutdown flag moves the loop to Closed at the next checkpoint.

use std::sync::Arc;

use braid_core::{NodeId, RoundGraph, Snapshot, TopologicalOrder};
use braid_ledger::Ledger;
use tracing::{debug, info, warn};

use crate::cache::CachedLedger;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::gossip::GossipRegistry;
use crate::sender::FinalizationSender;
use crate::session::{PeerSession, Shutdown};
use crate::timer::SyncTimer;

/// What one AwaitGraph wait produced.
#[derive(Debug, Clone, Default)]
pub struct AwaitOutcome {
    /// The most recent graph the peer pushed during the wait.
    pub graph: Option<RoundGraph>,
    /// The most recent positive offset computed from a push, else zero.
    pub offset: TopologicalOrder,
}

/// Drives catch-up for every peer of one local node.
///
/// Shared by all peer tasks; per-peer state lives in the task.
pub struct CatchUpEngine<L, S> {
    pub(crate) local_id: NodeId,
    pub(crate) ledger: CachedLedger<L>,
    pub(crate) sender: Arc<S>,
    pub(crate) gossip: Arc<GossipRegistry>,
    pub(crate) config: SyncConfig,
    pub(crate) closing: Shutdown,
}

impl<L, S> CatchUpEngine<L, S>
where
    L: Ledger,
    S: FinalizationSender,
{
    pub fn new(
        local_id: NodeId,
        ledger: Arc<L>,
        sender: Arc<S>,
        gossip: Arc<GossipRegistry>,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            local_id,
            ledger: CachedLedger::new(ledger, config.cache_capacity),
            sender,
            gossip,
            config,
            closing: Shutdown::new(),
        })
    }

    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn ledger(&self) -> &CachedLedger<L> {
        &self.ledger
    }

    pub fn gossip(&self) -> &Arc<GossipRegistry> {
        &self.gossip
    }

    /// The local shutdown flag.
    pub fn shutdown(&self) -> &Shutdown {
        &self.closing
    }

    fn is_closing(&self, session: &PeerSession) -> bool {
        self.closing.is_signaled() || session.is_closing()
    }

    /// Run the catch-up loop for one peer until either side shuts down.
    ///
    /// Consumes the session; its completion notification is closed when this
    /// returns.
    pub async fn run_peer(&self, mut session: PeerSession) {
        let peer = session.peer_id();
        let mut timer = SyncTimer::new();
        info!(local = %self.local_id, peer = %peer, "catch-up started");

        while !self.is_closing(&session) {
            let AwaitOutcome { graph, mut offset } = self.await_graph(&mut session, &mut timer).await;
            if self.is_closing(&session) {
                break;
            }

            if self.gossip.get(&peer).is_none() {
                continue;
            }
            let Some(remote) = graph else {
                continue;
            };

            while offset > 0 && !self.is_closing(&session) {
                match self.sync_since(&peer, &remote, offset).await {
                    Ok(batch) => {
                        offset = batch.offset;
                        if let Some(halt) = batch.halt {
                            debug!(peer = %peer, offset, sent = batch.sent, %halt, "streaming halted");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(peer = %peer, offset, error = %e, "streaming failed");
                        break;
                    }
                }
            }

            self.top_up_until(&peer, &remote, || self.is_closing(&session)).await;
        }

        info!(local = %self.local_id, peer = %peer, "catch-up stopped");
        session.close();
    }

    /// Wait for the peer's graph pushes until a full graph-wait period passes
    /// without one.
    ///
    /// Every push replaces the remote graph and recomputes the offset. Returns
    /// the default outcome if either side shuts down while waiting.
    pub async fn await_graph(&self, session: &mut PeerSession, timer: &mut SyncTimer) -> AwaitOutcome {
        let peer = session.peer_id();
        let mut outcome = AwaitOutcome::default();

        while !self.is_closing(session) {
            timer.reset(self.config.graph_wait());

            tokio::select! {
                pushed = session.next_graph() => match pushed {
                    Some(remote) => {
                        match self.offset_for(&peer, &remote).await {
                            Ok(offset) if offset > 0 => outcome.offset = offset,
                            Ok(_) => {}
                            Err(e) => warn!(peer = %peer, error = %e, "offset computation failed"),
                        }
                        outcome.graph = Some(remote);
                    }
                    None => {
                        debug!(peer = %peer, "graph channel closed");
                        session.mark_closing();
                    }
                },
                _ = timer.fired() => {
                    timer.drain();
                    debug!(peer = %peer, offset = outcome.offset, has_graph = outcome.graph.is_some(), "graph wait elapsed");
                    return outcome;
                }
            }
        }

        AwaitOutcome::default()
    }

    async fn offset_for(&self, peer: &NodeId, remote: &RoundGraph) -> Result<TopologicalOrder> {
        let local = self.ledger.build_graph().await?;
        self.topological_offset(peer, &local, remote).await
    }

    /// Send one finalization within the send budget.
    pub(crate) async fn send(&self, peer: &NodeId, snapshot: &Snapshot) -> Result<()> {
        match tokio::time::timeout(
            self.config.send_timeout,
            self.sender.send_finalization(peer, snapshot),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(format!(
                "finalization to {} after {:?}",
                peer, self.config.send_timeout
            ))),
        }
    }
}
