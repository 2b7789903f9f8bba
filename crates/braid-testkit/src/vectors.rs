//! Golden test vectors for canonical snapshot encoding.
//!
//! Every node must produce byte-identical canonical encodings, or content
//! hashes (and therefore idempotent appends) diverge between them.

use braid_core::{canonical_bytes, NodeId, Snapshot};
use serde::{Deserialize, Serialize};

/// A single golden test vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenVector {
    pub name: String,
    pub description: String,

    // Inputs
    pub node_id: String, // 32 bytes hex
    pub round_number: u64,
    pub timestamp: u64,
    pub payload: String, // hex

    // Expected output
    pub canonical_bytes: String, // hex
}

/// All golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "genesis".into(),
            description: "Zero node, round 0, empty payload".into(),
            node_id: "00".repeat(32),
            round_number: 0,
            timestamp: 0,
            payload: String::new(),
            canonical_bytes: "a40058200000000000000000000000000000000000000000000000000000000000000000010002000340"
                .into(),
        },
        GoldenVector {
            name: "small-round".into(),
            description: "One-byte round, two-byte timestamp".into(),
            node_id: "11".repeat(32),
            round_number: 7,
            timestamp: 1000,
            payload: hex::encode(b"tx"),
            canonical_bytes: "a400582011111111111111111111111111111111111111111111111111111111111111110107021903e803427478"
                .into(),
        },
        GoldenVector {
            name: "wide-round".into(),
            description: "Four-byte round, eight-byte timestamp, 30-byte payload".into(),
            node_id: "ab".repeat(32),
            round_number: 70_000,
            timestamp: 1_700_000_000_000_000_000,
            payload: hex::encode((0u8..30).collect::<Vec<u8>>()),
            canonical_bytes: concat!(
                "a4005820abababababababababababababababababababababababababababababababab",
                "011a00011170021b17979cfe362a000003581e000102030405060708090a0b0c0d0e0f",
                "101112131415161718191a1b1c1d"
            )
            .into(),
        },
    ]
}

/// Build the snapshot a vector describes.
pub fn snapshot_from_vector(vector: &GoldenVector) -> Result<Snapshot, String> {
    let node_id = NodeId::from_hex(&vector.node_id).map_err(|e| format!("{}: node_id: {}", vector.name, e))?;
    let payload = hex::decode(&vector.payload).map_err(|e| format!("{}: payload: {}", vector.name, e))?;
    Ok(Snapshot::new(node_id, vector.round_number, payload).with_timestamp(vector.timestamp))
}

/// Check every vector; returns the names of mismatches.
pub fn verify_all_vectors() -> Result<(), Vec<String>> {
    let failures: Vec<String> = all_vectors()
        .iter()
        .filter_map(|vector| match snapshot_from_vector(vector) {
            Ok(snapshot) if hex::encode(canonical_bytes(&snapshot)) == vector.canonical_bytes => None,
            Ok(_) => Some(format!("{}: canonical bytes differ", vector.name)),
            Err(e) => Some(e),
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}
