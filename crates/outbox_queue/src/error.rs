//! Error types for the durable queue.

use outbox_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors that can occur while using the durable queue.
///
/// Every variant means the offline-safety guarantee could not be honored for
/// the operation that produced it, so callers must surface it.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The device or configured quota has no room for the record.
    #[error("storage full: {0}")]
    StorageFull(#[source] StorageError),

    /// The underlying storage could not be read or written.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StorageError),

    /// The queue log contains a damaged record before its tail.
    #[error("queue log corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Offset of the damaged record.
        offset: u64,
        /// What was wrong with it.
        message: String,
    },

    /// Another handle already holds the queue directory.
    #[error("queue directory is locked by another handle")]
    Locked,

    /// The payload is not something the origin create endpoint accepts.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A payload could not be encoded or decoded.
    #[error("payload codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl QueueError {
    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }

    /// Returns true if this is a storage-capacity failure.
    pub fn is_storage_full(&self) -> bool {
        matches!(self, Self::StorageFull(_))
    }
}

impl From<StorageError> for QueueError {
    fn from(err: StorageError) -> Self {
        if err.is_full() {
            Self::StorageFull(err)
        } else {
            Self::StoreUnavailable(err)
        }
    }
}

impl From<io::Error> for QueueError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_split_by_capacity() {
        let full: QueueError = StorageError::Full {
            requested: 10,
            available: 0,
        }
        .into();
        assert!(full.is_storage_full());

        let enospc: QueueError = io::Error::from(io::ErrorKind::StorageFull).into();
        assert!(enospc.is_storage_full());

        let denied: QueueError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(matches!(denied, QueueError::StoreUnavailable(_)));
    }

    #[test]
    fn corruption_display() {
        let err = QueueError::corrupted(42, "bad magic");
        assert_eq!(
            err.to_string(),
            "queue log corrupted at offset 42: bad magic"
        );
    }
}
