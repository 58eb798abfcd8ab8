//! Error types for the sync layer.
//!
//! Transport problems are not errors here: they either queue the write or
//! show up as a failed sync outcome. What remains is what the caller has to
//! act on.

use outbox_queue::QueueError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while submitting or syncing writes.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The origin understood the request and rejected it.
    #[error("origin rejected the write: {0}")]
    Business(String),

    /// The local queue failed. Writes may be lost.
    #[error("local store error: {0}")]
    Store(#[from] QueueError),

    /// Configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
