//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};

/// A queue log held in a byte vector.
///
/// Nothing survives the process. A capacity set with
/// [`InMemoryBackend::with_capacity`] makes the storage-full path easy to
/// reach in tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    bytes: Vec<u8>,
    capacity: Option<u64>,
}

impl InMemoryBackend {
    /// Creates an empty, unbounded backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty backend that holds at most `max_bytes`.
    #[must_use]
    pub fn with_capacity(max_bytes: u64) -> Self {
        Self {
            bytes: Vec::new(),
            capacity: Some(max_bytes),
        }
    }

    /// Creates a backend over existing log bytes, e.g. to replay them.
    #[must_use]
    pub fn with_data(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            capacity: None,
        }
    }

    /// Copies out the stored bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = self.bytes.len() as u64;
        let out_of_range = || StorageError::ReadPastEnd { offset, len, size };

        let start = usize::try_from(offset).map_err(|_| out_of_range())?;
        let end = start.checked_add(len).ok_or_else(out_of_range)?;
        self.bytes
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(out_of_range)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.bytes.len() as u64;
        if let Some(capacity) = self.capacity {
            let available = capacity.saturating_sub(offset);
            if data.len() as u64 > available {
                return Err(StorageError::Full {
                    requested: data.len() as u64,
                    available,
                });
            }
        }
        self.bytes.extend_from_slice(data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.bytes.len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let size = self.bytes.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        self.bytes.truncate(new_size as usize);
        Ok(())
    }
}
