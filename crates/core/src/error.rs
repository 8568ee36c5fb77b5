//! Shared error type for the list engine and its collaborators.
//!
//! Each crate in this workspace defines its own narrow error enum rather
//! than sharing a single catch-all; `thiserror` gives us `Display`/`Error`
//! impls without the boilerplate.

use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the key codec, list metadata, list engine, and limiter.
#[derive(Debug, Error)]
pub enum Error {
    /// A list meta key could not be decoded.
    #[error("invalid list meta key")]
    InvalidMetaKey,

    /// A list element key could not be decoded (length mismatch).
    #[error("invalid list element key")]
    InvalidListKey,

    /// A list meta value was shorter than the minimum 16-byte payload.
    #[error("invalid list meta value")]
    InvalidMeta,

    /// head/tail sequence arithmetic produced a negative size or overflowed
    /// the valid sequence range.
    #[error("invalid list sequence")]
    InvalidSeq,

    /// `LIndex`/`LSet` addressed a position outside the list.
    #[error("index out of range")]
    InvalidIndex,

    /// A range or multi-key request exceeded the configured batch cap.
    #[error("requested batch size exceeds the maximum allowed")]
    TooMuchBatchSize,

    /// The slow-write limiter refused to admit this command.
    #[error("refused by slow limiter, try again later")]
    RefusedBySlowLimiter,

    /// A pass-through failure from the underlying KV engine (point read,
    /// scan, or batch commit).
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// True for errors a client should treat as "try again shortly" rather
    /// than a hard failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RefusedBySlowLimiter)
    }
}
