//! Strong type definitions for braid.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Round number within a single node's round sequence.
pub type RoundNumber = u64;

/// Position of a snapshot in the ledger's global total order.
///
/// Assigned at persistence time, starting at 1. Zero means "nothing yet".
pub type TopologicalOrder = u64;

/// A 32-byte identifier of a consensus-participating node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// Create a new NodeId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive a deterministic node ID from a label.
    ///
    /// Used for fixtures and for configured peers that are named rather than keyed.
    pub fn derive(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"braid-node-v0:");
        hasher.update(label.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Generate a random node ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for NodeId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for NodeId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// Content address of a snapshot: Blake3 over its canonical bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotHash(pub [u8; 32]);

impl SnapshotHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SnapshotHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for SnapshotHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl TryFrom<&[u8]> for SnapshotHash {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_hex_roundtrip() {
        let id = NodeId::from_bytes([0x42; 32]);
        let recovered = NodeId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_node_id_hex_wrong_length() {
        assert!(NodeId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_node_id_display() {
        let id = NodeId::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", id), "abababababababab");
        assert!(format!("{:?}", id).starts_with("NodeId("));
    }

    #[test]
    fn test_node_id_derive_is_deterministic() {
        assert_eq!(NodeId::derive("alpha"), NodeId::derive("alpha"));
        assert_ne!(NodeId::derive("alpha"), NodeId::derive("beta"));
    }
}
