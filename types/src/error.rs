//! Top-level error type shared across crates.

use thiserror::Error;

/// Errors raised while constructing or parsing the shared types.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("unknown referendum status: {0}")]
    UnknownStatus(String),

    #[error("{0}")]
    Other(String),
}
