//! Messages exchanged between peers during catch-up.
//!
//! Framing and transport are external; this module fixes what is sent.

use serde::{Deserialize, Serialize};

use braid_core::{Snapshot, SyncPoint};

use crate::error::{Result, SyncError};

/// Message size limits.
pub mod limits {
    /// Max points in one announced round graph.
    pub const MAX_GRAPH_POINTS: usize = 1024;
    /// Max payload bytes in one relayed snapshot.
    pub const MAX_SNAPSHOT_PAYLOAD: usize = 1024 * 1024;
}

/// Peer-to-peer catch-up messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerMessage {
    /// The sender's full round graph.
    RoundGraph { points: Vec<SyncPoint> },

    /// One finalized snapshot relayed during catch-up.
    SnapshotFinalization { snapshot: Snapshot },
}

impl PeerMessage {
    /// Check if this message respects size limits.
    pub fn validate_limits(&self) -> std::result::Result<(), &'static str> {
        match self {
            PeerMessage::RoundGraph { points } => {
                if points.len() > limits::MAX_GRAPH_POINTS {
                    return Err("too many graph points");
                }
            }
            PeerMessage::SnapshotFinalization { snapshot } => {
                if snapshot.payload.len() > limits::MAX_SNAPSHOT_PAYLOAD {
                    return Err("snapshot payload too large");
                }
            }
        }
        Ok(())
    }

    /// Encode as CBOR.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| SyncError::Encoding(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from CBOR and check limits.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let message: PeerMessage =
            ciborium::from_reader(bytes).map_err(|e| SyncError::InvalidMessage(e.to_string()))?;
        message
            .validate_limits()
            .map_err(|e| SyncError::InvalidMessage(e.into()))?;
        Ok(message)
    }
}
