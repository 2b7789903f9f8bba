//! Catch-up configuration and the protocol's tuning constants.

use std::ops::RangeInclusive;
use std::time::Duration;

use braid_core::RoundNumber;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Rounds past the peer's claimed round at which the offset probe looks.
///
/// The peer's view may be stale because the referenced node has since been
/// removed from membership, or because its round was read through a cache
/// and is one behind. Empirical; calibrate against the deployment's round gap.
pub const ROUND_PROBE_LOOKAHEAD: RoundNumber = 2;

/// Multiple of the reference threshold beyond the peer's round at which a
/// replayed snapshot is rejected as too far in the future. Empirical.
pub const FUTURE_WINDOW_FACTOR: RoundNumber = 2;

/// Extra rounds past `remote + threshold` covered by the head top-up.
pub const HEAD_TOPUP_MARGIN: RoundNumber = 2;

pub const DEFAULT_BATCH_LIMIT: usize = 200;
pub const DEFAULT_REPLAY_PAUSE: Duration = Duration::from_millis(100);
pub const DEFAULT_SNAPSHOT_ROUND_GAP: Duration = Duration::from_secs(3);
pub const DEFAULT_SNAPSHOT_REFERENCE_THRESHOLD: RoundNumber = 10;

/// Configuration for catch-up behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Expected interval between rounds. A peer's graph is awaited for a
    /// third of this before the loop moves on.
    #[serde(with = "duration_ms")]
    pub snapshot_round_gap: Duration,
    /// How far a claimed round may legitimately diverge from what comparison
    /// computed.
    pub snapshot_reference_threshold: RoundNumber,
    /// Maximum snapshots fetched per streaming pass.
    pub batch_limit: usize,
    /// Pause after each streamed batch.
    #[serde(with = "duration_ms")]
    pub replay_pause: Duration,
    /// Budget for one finalization send.
    #[serde(with = "duration_ms")]
    pub send_timeout: Duration,
    /// Capacity of each peer's inbound graph channel.
    pub graph_channel_capacity: usize,
    /// Maximum number of final (node, round) reads kept in memory.
    pub cache_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            snapshot_round_gap: DEFAULT_SNAPSHOT_ROUND_GAP,
            snapshot_reference_threshold: DEFAULT_SNAPSHOT_REFERENCE_THRESHOLD,
            batch_limit: DEFAULT_BATCH_LIMIT,
            replay_pause: DEFAULT_REPLAY_PAUSE,
            send_timeout: Duration::from_secs(1),
            graph_channel_capacity: 16,
            cache_capacity: 1024,
        }
    }
}

impl SyncConfig {
    /// How long AwaitGraph waits without a push before moving on.
    pub fn graph_wait(&self) -> Duration {
        self.snapshot_round_gap / 3
    }

    /// First round considered too far ahead of `remote_round`.
    pub fn future_bound(&self, remote_round: RoundNumber) -> RoundNumber {
        remote_round.saturating_add(
            self.snapshot_reference_threshold
                .saturating_mul(FUTURE_WINDOW_FACTOR),
        )
    }

    /// Rounds pushed directly by the head top-up for a node the peer knows
    /// at `remote_final`.
    pub fn head_topup_rounds(&self, remote_final: RoundNumber) -> RangeInclusive<RoundNumber> {
        let last = remote_final
            .saturating_add(self.snapshot_reference_threshold)
            .saturating_add(HEAD_TOPUP_MARGIN);
        remote_final..=last
    }

    pub fn validate(&self) -> Result<()> {
        if self.snapshot_round_gap < Duration::from_millis(3) {
            return Err(SyncError::InvalidConfig(
                "snapshot_round_gap must be at least 3ms".into(),
            ));
        }
        if self.batch_limit == 0 {
            return Err(SyncError::InvalidConfig("batch_limit must be positive".into()));
        }
        if self.graph_channel_capacity == 0 {
            return Err(SyncError::InvalidConfig(
                "graph_channel_capacity must be positive".into(),
            ));
        }
        if self.send_timeout.is_zero() {
            return Err(SyncError::InvalidConfig("send_timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Durations as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
