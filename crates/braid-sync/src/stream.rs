//! Batch streaming from a topological offset.

use std::fmt;

use braid_core::{NodeId, RoundGraph, RoundNumber, TopologicalOrder};
use braid_ledger::Ledger;

use crate::engine::CatchUpEngine;
use crate::error::Result;
use crate::sender::FinalizationSender;

/// Why a streaming pass stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// The batch was short: the log's tail has been reached for now.
    Eof,
    /// A snapshot's round is too far beyond what the peer acknowledged.
    Future {
        node_id: NodeId,
        round: RoundNumber,
        remote_round: RoundNumber,
    },
}

impl fmt::Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Halt::Eof => write!(f, "EOF"),
            Halt::Future {
                node_id,
                round,
                remote_round,
            } => write!(f, "FUTURE node={} round={} remote={}", node_id, round, remote_round),
        }
    }
}

/// Result of one streaming pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Order of the last snapshot safely passed over (sent or skipped).
    pub offset: TopologicalOrder,
    /// Snapshots sent in this pass.
    pub sent: usize,
    pub halt: Option<Halt>,
}

impl<L, S> CatchUpEngine<L, S>
where
    L: Ledger,
    S: FinalizationSender,
{
    /// Stream one batch of snapshots after `offset` to `peer`.
    ///
    /// Snapshots below the peer's known round for their node are skipped.
    /// Reaching one at or past the future bound halts the pass before it is
    /// sent. A send failure is returned as an error.
    pub async fn sync_since(
        &self,
        peer: &NodeId,
        remote: &RoundGraph,
        offset: TopologicalOrder,
    ) -> Result<BatchOutcome> {
        let limit = self.config.batch_limit;
        let batch = self.ledger.read_snapshots_since_topology(offset, limit).await?;

        let mut outcome = BatchOutcome {
            offset,
            sent: 0,
            halt: None,
        };

        for entry in &batch {
            let node_id = *entry.node_id();
            let round = entry.round_number();
            let remote_round = remote.round_of(&node_id);

            if round < remote_round {
                outcome.offset = entry.topological_order;
                continue;
            }

            if round >= self.config.future_bound(remote_round) {
                outcome.halt = Some(Halt::Future {
                    node_id,
                    round,
                    remote_round,
                });
                return Ok(outcome);
            }

            self.send(peer, &entry.snapshot).await?;
            outcome.sent += 1;
            outcome.offset = entry.topological_order;
        }

        tokio::time::sleep(self.config.replay_pause).await;

        if batch.len() < limit {
            outcome.halt = Some(Halt::Eof);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use braid_core::SyncPoint;
    use braid_ledger::MemoryLedger;
    use proptest::prelude::*;

    use super::*;
    use crate::config::SyncConfig;
    use crate::error::SyncError;
    use crate::gossip::GossipRegistry;
    use crate::sender::recording::RecordingSender;
    use crate::testutil::{fast_config, node, TestLedger};

    fn engine_with(
        ledger: &TestLedger,
        sender: Arc<RecordingSender>,
        config: SyncConfig,
    ) -> CatchUpEngine<MemoryLedger, RecordingSender> {
        CatchUpEngine::new(node(0), ledger.inner.clone(), sender, Arc::new(GossipRegistry::new()), config).unwrap()
    }

    fn graph(points: &[(u8, u64)]) -> RoundGraph {
        points.iter().map(|(n, r)| SyncPoint::new(node(*n), *r)).collect()
    }

    #[tokio::test]
    async fn test_scenario_sends_near_rounds_and_halts_on_future() {
        let ledger = TestLedger::new();
        let r8 = ledger.append(1, 8).await;
        let r20 = ledger.append(1, 20).await;
        let sender = Arc::new(RecordingSender::new());
        let engine = engine_with(&ledger, sender.clone(), fast_config());

        let remote = graph(&[(1, 7), (2, 5)]);
        let outcome = engine.sync_since(&node(9), &remote, 0).await.unwrap();

        assert_eq!(outcome.offset, r8);
        assert_eq!(outcome.sent, 1);
        assert_eq!(
            outcome.halt,
            Some(Halt::Future {
                node_id: node(1),
                round: 20,
                remote_round: 7
            })
        );
        assert!(outcome.offset < r20);
        assert_eq!(sender.sent_to(&node(9))[0].round_number, 8);
    }

    #[tokio::test]
    async fn test_skips_rounds_the_peer_has() {
        let ledger = TestLedger::rounds(&[(1, 0..=6)]).await;
        let sender = Arc::new(RecordingSender::new());
        let engine = engine_with(&ledger, sender.clone(), fast_config());

        let outcome = engine.sync_since(&node(9), &graph(&[(1, 4)]), 0).await.unwrap();

        let rounds: Vec<u64> = sender.sent_to(&node(9)).iter().map(|s| s.round_number).collect();
        assert_eq!(rounds, vec![4, 5, 6]);
        assert_eq!(outcome.offset, ledger.order_of(1, 6).await);
        assert_eq!(outcome.halt, Some(Halt::Eof));
    }

    #[tokio::test]
    async fn test_full_batch_does_not_report_eof() {
        let ledger = TestLedger::rounds(&[(1, 0..=4)]).await;
        let config = SyncConfig {
            batch_limit: 2,
            ..fast_config()
        };
        let engine = engine_with(&ledger, Arc::new(RecordingSender::new()), config);
        let remote = graph(&[(1, 0)]);

        let first = engine.sync_since(&node(9), &remote, 0).await.unwrap();
        assert_eq!(first.sent, 2);
        assert_eq!(first.halt, None);

        let second = engine.sync_since(&node(9), &remote, first.offset).await.unwrap();
        assert_eq!(second.sent, 2);
        assert!(second.offset > first.offset);

        let last = engine.sync_since(&node(9), &remote, second.offset).await.unwrap();
        assert_eq!(last.sent, 1);
        assert_eq!(last.halt, Some(Halt::Eof));
    }

    #[tokio::test]
    async fn test_past_tail_is_immediate_eof() {
        let ledger = TestLedger::rounds(&[(1, 0..=3)]).await;
        let sender = Arc::new(RecordingSender::new());
        let engine = engine_with(&ledger, sender.clone(), fast_config());
        let tail = ledger.order_of(1, 3).await;

        let outcome = engine.sync_since(&node(9), &graph(&[(1, 0)]), tail).await.unwrap();
        assert_eq!(outcome, BatchOutcome { offset: tail, sent: 0, halt: Some(Halt::Eof) });
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_is_returned() {
        let ledger = TestLedger::rounds(&[(1, 0..=3)]).await;
        let engine = engine_with(&ledger, Arc::new(RecordingSender::failing_after(1)), fast_config());

        let result = engine.sync_since(&node(9), &graph(&[(1, 0)]), 0).await;
        assert!(matches!(result, Err(SyncError::TransportError(_))));
    }

    #[test]
    fn test_halt_display() {
        assert_eq!(Halt::Eof.to_string(), "EOF");
        let future = Halt::Future {
            node_id: node(1),
            round: 20,
            remote_round: 7,
        };
        assert!(future.to_string().starts_with("FUTURE"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Offsets never decrease, nothing below the peer's round is sent,
        /// and nothing at or past the future bound is sent.
        #[test]
        fn prop_streaming_invariants(
            rounds in prop::collection::vec((1u8..4, 0u64..30), 1..40),
            claims in prop::collection::vec(0u64..20, 3),
            batch_limit in 1usize..8,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
            runtime.block_on(async {
                let ledger = TestLedger::new();
                for (n, r) in &rounds {
                    ledger.append(*n, *r).await;
                }
                let sender = Arc::new(RecordingSender::new());
                let config = SyncConfig {
                    batch_limit,
                    replay_pause: std::time::Duration::ZERO,
                    ..fast_config()
                };
                let engine = engine_with(&ledger, sender.clone(), config.clone());
                let remote: RoundGraph = claims
                    .iter()
                    .enumerate()
                    .map(|(i, r)| SyncPoint::new(node(i as u8 + 1), *r))
                    .collect();

                let mut offset = 0;
                loop {
                    let outcome = engine.sync_since(&node(9), &remote, offset).await.unwrap();
                    prop_assert!(outcome.offset >= offset);
                    offset = outcome.offset;
                    if outcome.halt.is_some() {
                        break;
                    }
                }

                for snapshot in sender.sent_to(&node(9)) {
                    let remote_round = remote.round_of(&snapshot.node_id);
                    prop_assert!(snapshot.round_number >= remote_round);
                    prop_assert!(snapshot.round_number < config.future_bound(remote_round));
                }
                Ok(())
            })?;
        }
    }
}
