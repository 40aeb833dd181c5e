//! Error types for the sync engine
//!
//! The taxonomy follows how each failure propagates: listing failures abort
//! the job, transfer failures are retried per object, checksum mismatches are
//! recorded but never retried, and a bad state snapshot is silently replaced
//! by a fresh run.

use thiserror::Error;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the sync engine and its storage backends
#[derive(Debug, Error)]
pub enum Error {
    /// Network or authentication failure reaching an endpoint
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object or bucket does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Copy, get or put failed for a single object
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Post-transfer digest comparison failed
    #[error("Checksum mismatch for {key}")]
    ChecksumMismatch { key: String },

    /// State snapshot could not be read or belongs to another job
    #[error("Unusable state snapshot: {0}")]
    StateCorruption(String),

    /// Missing credentials, endpoint or invalid option values
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Job was stopped by an external signal after checkpointing
    #[error("Sync interrupted")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether a failed transfer attempt that produced this error may be retried
    ///
    /// Every transport-level failure is retried; only failures that another
    /// attempt cannot fix are excluded.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Error::Configuration(_) | Error::ChecksumMismatch { .. } | Error::Interrupted
        )
    }

    /// Whether this is the "object does not exist" sentinel
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
