//! Error types for snapgrid core
//!
//! Provides error handling for:
//! - Image downloads (transport, empty body, decode, deadline)
//! - Result store indexing
//! - Record state transitions
//! - Worker pool construction

use crate::record::RecordState;

/// Errors produced while acquiring the bytes for one image
///
/// None of these reach the presentation layer directly: a failed download
/// becomes a `Failed` record carrying the broken placeholder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DownloadError {
    /// Network or transport failure
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Bytes were not a valid image
    #[error("decode failed: {0}")]
    Decode(String),

    /// Server answered with a zero-length body
    #[error("empty payload")]
    EmptyPayload,

    /// Fetch did not finish before the deadline
    #[error("fetch timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl DownloadError {
    /// Create fetch error from any displayable transport error
    pub fn fetch(err: impl std::fmt::Display) -> Self {
        Self::Fetch(err.to_string())
    }

    /// Create decode error from any displayable decoder error
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Index past the end of the current generation
    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
}

/// Record state machine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Transition not in the allowed table
    #[error("illegal transition {from:?} -> {to:?}")]
    Illegal { from: RecordState, to: RecordState },
}

/// Worker pool errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Pool was built outside a tokio runtime
    #[error("no tokio runtime available for the worker pool")]
    NoRuntime,

    /// Concurrency bound of zero
    #[error("worker pool needs at least one permit")]
    ZeroCapacity,
}

/// Main snapgrid error type
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("state error: {0}")]
    Transition(#[from] TransitionError),

    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Result type alias for snapgrid operations
pub type GridResult<T> = Result<T, GridError>;
