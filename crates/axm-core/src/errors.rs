//! Error types for axm-core.
//!
//! `axm-core` never panics on malformed input and never reads from the
//! environment; every fallible path returns an [`AxmError`]. Higher layers
//! (the CLI) are responsible for presentation and exit codes.

use thiserror::Error;

/// The crate-wide result alias.
pub type AxmResult<T> = Result<T, AxmError>;

/// Library-level errors shared by identity, canonical JSON, tables, Merkle
/// hashing, crypto, and text normalization.
#[derive(Debug, Error)]
pub enum AxmError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("resource limit exceeded: {0}")]
    LimitExceeded(String),
}

impl AxmError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn limit_exceeded(msg: impl Into<String>) -> Self {
        Self::LimitExceeded(msg.into())
    }
}
