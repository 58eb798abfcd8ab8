//! Queue log record types and serialization.

use crate::error::{QueueError, QueueResult};
use crate::types::RecordKey;

/// Magic bytes identifying a queue log frame.
pub const LOG_MAGIC: [u8; 4] = *b"OBXQ";

/// Current queue log format version.
pub const LOG_VERSION: u16 = 1;

/// Type of queue log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// A payload was queued.
    Append = 1,
    /// A set of queued payloads was removed.
    Remove = 2,
}

impl LogRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Append),
            2 => Some(Self::Remove),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One entry of the queue log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Queue a payload under `key`.
    Append {
        /// Local key assigned at insertion.
        key: RecordKey,
        /// JSON-encoded payload bytes.
        payload: Vec<u8>,
    },

    /// Remove the listed keys.
    Remove {
        /// Keys removed by one clear.
        keys: Vec<RecordKey>,
    },
}

impl LogRecord {
    /// Maximum encoded payload size; the frame length field is 4 bytes.
    pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> LogRecordType {
        match self {
            Self::Append { .. } => LogRecordType::Append,
            Self::Remove { .. } => LogRecordType::Remove,
        }
    }

    /// Returns the highest key mentioned by this record.
    #[must_use]
    pub fn max_key(&self) -> Option<RecordKey> {
        match self {
            Self::Append { key, .. } => Some(*key),
            Self::Remove { keys } => keys.iter().copied().max(),
        }
    }

    /// Serializes the record payload (without frame).
    ///
    /// Layout: `Append` = key (u64) + payload bytes; `Remove` = count (u32)
    /// followed by `count` keys (u64). All integers little-endian.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` if the encoded record would not fit the
    /// frame length field.
    pub fn encode_payload(&self) -> QueueResult<Vec<u8>> {
        let buf = match self {
            Self::Append { key, payload } => {
                let mut buf = Vec::with_capacity(8 + payload.len());
                buf.extend_from_slice(&key.as_u64().to_le_bytes());
                buf.extend_from_slice(payload);
                buf
            }
            Self::Remove { keys } => {
                let count = u32::try_from(keys.len()).map_err(|_| {
                    QueueError::InvalidPayload(format!("too many keys in one remove: {}", keys.len()))
                })?;
                let mut buf = Vec::with_capacity(4 + keys.len() * 8);
                buf.extend_from_slice(&count.to_le_bytes());
                for key in keys {
                    buf.extend_from_slice(&key.as_u64().to_le_bytes());
                }
                buf
            }
        };

        if buf.len() > Self::MAX_PAYLOAD_SIZE {
            return Err(QueueError::InvalidPayload(format!(
                "record too large: {} bytes exceeds maximum of {} bytes",
                buf.len(),
                Self::MAX_PAYLOAD_SIZE
            )));
        }

        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    ///
    /// `offset` is the frame offset, used for error reporting.
    pub fn decode_payload(
        record_type: LogRecordType,
        payload: &[u8],
        offset: u64,
    ) -> QueueResult<Self> {
        let read_u64 = |at: usize| -> QueueResult<u64> {
            payload
                .get(at..at + 8)
                .and_then(|b| b.try_into().ok())
                .map(u64::from_le_bytes)
                .ok_or_else(|| QueueError::corrupted(offset, "unexpected end of record"))
        };

        match record_type {
            LogRecordType::Append => {
                let key = RecordKey::new(read_u64(0)?);
                Ok(Self::Append {
                    key,
                    payload: payload[8..].to_vec(),
                })
            }

            LogRecordType::Remove => {
                let count = payload
                    .get(0..4)
                    .and_then(|b| b.try_into().ok())
                    .map(u32::from_le_bytes)
                    .ok_or_else(|| QueueError::corrupted(offset, "missing key count"))?
                    as usize;

                let expected = 4 + count * 8;
                if payload.len() != expected {
                    return Err(QueueError::corrupted(
                        offset,
                        format!(
                            "remove record length mismatch: expected {} bytes, got {}",
                            expected,
                            payload.len()
                        ),
                    ));
                }

                let keys = (0..count)
                    .map(|i| read_u64(4 + i * 8).map(RecordKey::new))
                    .collect::<QueueResult<Vec<_>>>()?;
                Ok(Self::Remove { keys })
            }
        }
    }
}

/// Computes the CRC32 (IEEE) checksum of `data`.
pub(crate) fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
