//! Head-round top-up.
//!
//! Pushes the rounds just past what the peer claims for each node, whether
//! or not the topological cursor has reached them.

use braid_core::{NodeId, RoundGraph};
use braid_ledger::Ledger;
use tracing::{debug, warn};

use crate::engine::CatchUpEngine;
use crate::sender::FinalizationSender;

impl<L, S> CatchUpEngine<L, S>
where
    L: Ledger,
    S: FinalizationSender,
{
    /// Top up one node's head rounds for `peer`. Returns the number sent.
    ///
    /// Does nothing if the peer is ahead of the local view for `node_id`.
    /// A fetch failure skips that round; a send failure ends this node.
    pub async fn sync_head_round(
        &self,
        peer: &NodeId,
        node_id: &NodeId,
        local: &RoundGraph,
        remote: &RoundGraph,
    ) -> usize {
        let remote_final = remote.round_of(node_id);
        let local_final = local.round_of(node_id);
        if remote_final > local_final {
            return 0;
        }

        let mut sent = 0;
        for round in self.config.head_topup_rounds(remote_final) {
            let snapshots = match self
                .ledger
                .read_snapshots_for_node_round(node_id, round, round < local_final)
                .await
            {
                Ok(snapshots) => snapshots,
                Err(e) => {
                    warn!(peer = %peer, node = %node_id, round, error = %e, "head round read failed");
                    continue;
                }
            };

            for entry in &snapshots {
                if let Err(e) = self.send(peer, &entry.snapshot).await {
                    warn!(peer = %peer, node = %node_id, round, error = %e, "head round send failed");
                    return sent;
                }
                sent += 1;
            }
        }
        sent
    }

    /// Top up every local node for `peer` against a fresh local view.
    pub async fn top_up(&self, peer: &NodeId, remote: &RoundGraph) -> usize {
        self.top_up_until(peer, remote, || false).await
    }

    /// Like [`top_up`](Self::top_up), but checks `stop` before each node.
    pub(crate) async fn top_up_until(&self, peer: &NodeId, remote: &RoundGraph, stop: impl Fn() -> bool) -> usize {
        let local = match self.ledger.build_graph().await {
            Ok(local) => local,
            Err(e) => {
                warn!(peer = %peer, error = %e, "local graph unavailable for top-up");
                return 0;
            }
        };
        let nodes = match self.ledger.read_all_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(peer = %peer, error = %e, "membership unavailable for top-up");
                return 0;
            }
        };

        let mut sent = 0;
        for node_id in &nodes {
            if stop() {
                debug!(peer = %peer, sent, "top-up interrupted");
                return sent;
            }
            sent += self.sync_head_round(peer, node_id, &local, remote).await;
        }
        if sent > 0 {
            debug!(peer = %peer, sent, "head rounds topped up");
        }
        sent
    }
}
