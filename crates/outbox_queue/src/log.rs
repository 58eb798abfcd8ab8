//! Framed queue log on top of a storage backend.
//!
//! Frame layout: magic (4) + version (2) + type (1) + length (4) + payload +
//! CRC32 (4) over everything before it.

use crate::error::{QueueError, QueueResult};
use crate::record::{compute_crc32, LogRecord, LogRecordType, LOG_MAGIC, LOG_VERSION};
use outbox_storage::{StorageBackend, StorageError, StorageResult};
use std::io;
use tracing::{debug, error, warn};

/// magic (4) + version (2) + type (1) + length (4) = 11 bytes
const HEADER_SIZE: usize = 11;

const CRC_SIZE: usize = 4;

/// Result of scanning the log on open.
#[derive(Debug, Default)]
pub(crate) struct Replay {
    /// Records in log order, with their frame offsets.
    pub records: Vec<(u64, LogRecord)>,
    /// Bytes dropped from a torn tail, if any.
    pub truncated_bytes: u64,
}

/// Append-only record log.
pub(crate) struct QueueLog {
    backend: Box<dyn StorageBackend>,
    sync_on_write: bool,
    /// Set when a frame that failed to persist could not be removed again.
    /// The log refuses appends until a reset, since its tail is unknown.
    poisoned: bool,
}

impl QueueLog {
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_write: bool) -> Self {
        Self {
            backend,
            sync_on_write,
            poisoned: false,
        }
    }

    /// Frames and appends a record. Returns the frame offset.
    ///
    /// Either the frame is persisted and `Ok` is returned, or it is gone from
    /// the log again and the error is returned. If removing it fails too, the
    /// log is poisoned and every later append fails with `StoreUnavailable`.
    pub fn append(&mut self, record: &LogRecord) -> QueueResult<u64> {
        if self.poisoned {
            return Err(QueueError::StoreUnavailable(StorageError::Io(io::Error::other(
                "queue log tail is in an unknown state; reopen the store",
            ))));
        }

        let frame = encode_frame(record)?;
        let offset = self.backend.append(&frame)?;

        if let Err(e) = self.persist() {
            if let Err(rollback) = self.backend.truncate(offset) {
                self.poisoned = true;
                error!(
                    offset,
                    error = %e,
                    rollback_error = %rollback,
                    "unpersisted frame could not be rolled back"
                );
                return Err(QueueError::StoreUnavailable(rollback));
            }
            warn!(offset, error = %e, "frame not persisted, rolled back");
            return Err(e.into());
        }

        debug!(
            offset,
            len = frame.len(),
            kind = ?record.record_type(),
            "queue log frame written"
        );
        Ok(offset)
    }

    /// Reads every record and drops a torn tail.
    ///
    /// A frame that is incomplete or fails its checksum is treated as a torn
    /// write only when it is the last thing in the log; anywhere else it is
    /// corruption.
    pub fn replay(&mut self) -> QueueResult<Replay> {
        let size = self.backend.size()?;
        let mut replay = Replay::default();
        let mut offset = 0u64;

        while offset < size {
            let remaining = size - offset;
            if remaining < (HEADER_SIZE + CRC_SIZE) as u64 {
                replay.truncated_bytes = self.drop_tail(offset, size)?;
                break;
            }

            let header = self.backend.read_at(offset, HEADER_SIZE)?;
            if header[0..4] != LOG_MAGIC {
                return Err(QueueError::corrupted(offset, "bad frame magic"));
            }

            let version = u16::from_le_bytes([header[4], header[5]]);
            if version != LOG_VERSION {
                return Err(QueueError::corrupted(
                    offset,
                    format!("unsupported log version {version}"),
                ));
            }

            let record_type = LogRecordType::from_byte(header[6]).ok_or_else(|| {
                QueueError::corrupted(offset, format!("unknown record type {}", header[6]))
            })?;

            let len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as u64;
            let frame_len = HEADER_SIZE as u64 + len + CRC_SIZE as u64;
            if frame_len > remaining {
                replay.truncated_bytes = self.drop_tail(offset, size)?;
                break;
            }

            let frame = self.backend.read_at(offset, frame_len as usize)?;
            let body_end = frame.len() - CRC_SIZE;
            let stored_crc = u32::from_le_bytes([
                frame[body_end],
                frame[body_end + 1],
                frame[body_end + 2],
                frame[body_end + 3],
            ]);
            if compute_crc32(&frame[..body_end]) != stored_crc {
                if offset + frame_len == size {
                    replay.truncated_bytes = self.drop_tail(offset, size)?;
                    break;
                }
                return Err(QueueError::corrupted(offset, "checksum mismatch"));
            }

            let record = LogRecord::decode_payload(record_type, &frame[HEADER_SIZE..body_end], offset)?;
            replay.records.push((offset, record));
            offset += frame_len;
        }

        Ok(replay)
    }

    /// Discards the whole log.
    pub fn reset(&mut self) -> QueueResult<()> {
        self.backend.truncate(0)?;
        self.poisoned = false;
        Ok(())
    }

    fn persist(&mut self) -> StorageResult<()> {
        self.backend.flush()?;
        if self.sync_on_write {
            self.backend.sync()?;
        }
        Ok(())
    }

    pub fn size(&self) -> QueueResult<u64> {
        Ok(self.backend.size()?)
    }

    fn drop_tail(&mut self, offset: u64, size: u64) -> QueueResult<u64> {
        let dropped = size - offset;
        warn!(offset, dropped, "dropping torn tail from queue log");
        self.backend.truncate(offset)?;
        Ok(dropped)
    }
}

impl std::fmt::Debug for QueueLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueLog")
            .field("sync_on_write", &self.sync_on_write)
            .finish_non_exhaustive()
    }
}

fn encode_frame(record: &LogRecord) -> QueueResult<Vec<u8>> {
    let payload = record.encode_payload()?;
    let len = u32::try_from(payload.len())
        .map_err(|_| QueueError::InvalidPayload("log record too large".into()))?;

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&LOG_MAGIC);
    data.extend_from_slice(&LOG_VERSION.to_le_bytes());
    data.push(record.record_type().as_byte());
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(&payload);

    let crc = compute_crc32(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}
