//! Canonical CBOR encoding for snapshots.
//!
//! Snapshots encode as a definite-length map with small integer keys in
//! ascending order and minimal-length integers, so the same snapshot always
//! produces the same bytes (and the same hash).

use ciborium::value::Value;

use crate::error::CoreError;
use crate::snapshot::Snapshot;
use crate::types::NodeId;

/// Map keys. Keys 0-23 encode as single bytes.
mod keys {
    pub const NODE_ID: u64 = 0;
    pub const ROUND_NUMBER: u64 = 1;
    pub const TIMESTAMP: u64 = 2;
    pub const PAYLOAD: u64 = 3;
}

/// Encode a snapshot to canonical bytes.
pub fn canonical_bytes(snapshot: &Snapshot) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + snapshot.payload.len());
    encode_uint(&mut buf, 5, 4);

    encode_uint(&mut buf, 0, keys::NODE_ID);
    encode_bytes(&mut buf, snapshot.node_id.as_bytes());

    encode_uint(&mut buf, 0, keys::ROUND_NUMBER);
    encode_uint(&mut buf, 0, snapshot.round_number);

    encode_uint(&mut buf, 0, keys::TIMESTAMP);
    encode_uint(&mut buf, 0, snapshot.timestamp);

    encode_uint(&mut buf, 0, keys::PAYLOAD);
    encode_bytes(&mut buf, &snapshot.payload);

    buf
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Decode a snapshot from canonical bytes.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot, CoreError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedSnapshot("expected map".into())),
    };

    let get = |key: u64| -> Option<&Value> {
        map.iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
            .map(|(_, v)| v)
    };

    let node_id = match get(keys::NODE_ID) {
        Some(Value::Bytes(b)) => {
            NodeId::try_from(b.as_slice()).map_err(|_| CoreError::InvalidIdLength(b.len()))?
        }
        _ => return Err(CoreError::MalformedSnapshot("missing node_id".into())),
    };

    let round_number = read_uint(get(keys::ROUND_NUMBER), "round_number")?;
    let timestamp = read_uint(get(keys::TIMESTAMP), "timestamp")?;

    let payload = match get(keys::PAYLOAD) {
        Some(Value::Bytes(b)) => b.clone(),
        _ => return Err(CoreError::MalformedSnapshot("missing payload".into())),
    };

    Ok(Snapshot {
        node_id,
        round_number,
        timestamp,
        payload: payload.into(),
    })
}

fn read_uint(value: Option<&Value>, field: &str) -> Result<u64, CoreError> {
    match value {
        Some(Value::Integer(i)) => u64::try_from(i128::from(*i))
            .map_err(|_| CoreError::MalformedSnapshot(format!("{} out of range", field))),
        _ => Err(CoreError::MalformedSnapshot(format!("missing {}", field))),
    }
}
