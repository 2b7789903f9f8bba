//! Round graph comparison.

use braid_core::{NodeId, RoundGraph, TopologicalOrder};
use braid_ledger::Ledger;
use tracing::debug;

use crate::config::ROUND_PROBE_LOOKAHEAD;
use crate::engine::CatchUpEngine;
use crate::error::Result;
use crate::sender::FinalizationSender;

impl<L, S> CatchUpEngine<L, S>
where
    L: Ledger,
    S: FinalizationSender,
{
    /// Compute where replay to `peer` should start.
    ///
    /// For every local node the peer is not ahead on, the first snapshot at
    /// `remote round + ROUND_PROBE_LOOKAHEAD` is a candidate; the result is
    /// the smallest candidate, or zero if there is none. Any ledger failure
    /// aborts the whole comparison.
    pub async fn topological_offset(
        &self,
        peer: &NodeId,
        local: &RoundGraph,
        remote: &RoundGraph,
    ) -> Result<TopologicalOrder> {
        let mut offset: Option<TopologicalOrder> = None;

        for point in local.iter() {
            let Some(claimed) = remote.get(&point.node_id) else {
                continue;
            };
            if claimed.number > point.number {
                continue;
            }

            let probe = claimed.number.saturating_add(ROUND_PROBE_LOOKAHEAD);
            let snapshots = self
                .ledger
                .read_snapshots_for_node_round(&point.node_id, probe, probe < point.number)
                .await?;
            let Some(first) = snapshots.first() else {
                continue;
            };

            let candidate = first.topological_order;
            offset = Some(offset.map_or(candidate, |o| o.min(candidate)));
        }

        let offset = offset.unwrap_or(0);
        if offset > 0 {
            debug!(peer = %peer, offset, "computed replay offset");
        }
        Ok(offset)
    }
}
