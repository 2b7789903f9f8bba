//! Error types for braid core.

use thiserror::Error;

/// Errors raised while encoding or decoding core types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("invalid identifier length: expected 32 bytes, got {0}")]
    InvalidIdLength(usize),
}
