//! The durable local store.

use crate::config::StoreConfig;
use crate::dir::QueueDir;
use crate::error::{QueueError, QueueResult};
use crate::log::QueueLog;
use crate::record::LogRecord;
use crate::types::{QueuedRecord, RecordKey};
use outbox_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Persistent queue of writes waiting for the origin server.
///
/// One `DurableStore` is opened per queue directory per process and shared
/// (typically as `Arc<DurableStore>`) between every component that appends
/// or drains. Each operation runs to completion under an internal lock, so
/// an `append` can never interleave with the middle of a `clear`.
///
/// # Example
///
/// ```no_run
/// use outbox_queue::DurableStore;
/// use serde_json::json;
/// use std::path::Path;
///
/// let store = DurableStore::open(Path::new("pizza_hunt")).unwrap();
/// let key = store.append(json!({"pizzaName": "Pepperoni"})).unwrap();
/// println!("queued {key}");
/// ```
pub struct DurableStore {
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    log: QueueLog,
    dir: Option<QueueDir>,
    live: BTreeMap<RecordKey, Value>,
    next_key: RecordKey,
}

/// An ordered, point-in-time copy of the queued records.
///
/// Records appended after the snapshot was taken are not part of it, and
/// [`DurableStore::clear_snapshot`] will not remove them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    records: Vec<QueuedRecord>,
}

impl Snapshot {
    /// Returns the records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[QueuedRecord] {
        &self.records
    }

    /// Returns the keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<RecordKey> {
        self.records.iter().map(|r| r.key).collect()
    }

    /// Returns the payloads in insertion order, ready to send as one batch.
    #[must_use]
    pub fn payloads(&self) -> Vec<Value> {
        self.records.iter().map(|r| r.payload.clone()).collect()
    }

    /// Number of records in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the snapshot holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Point-in-time statistics about a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    /// Records currently queued.
    pub records: usize,
    /// Size of the queue log in bytes.
    pub log_bytes: u64,
    /// Key the next append will receive.
    pub next_key: RecordKey,
}

impl DurableStore {
    /// Opens (creating on first use) the queue stored in directory `path`.
    ///
    /// # Errors
    ///
    /// - `Locked` if the directory is already open
    /// - `Corrupted` if the log is damaged before its tail
    /// - `StoreUnavailable` on I/O failure
    pub fn open(path: &Path) -> QueueResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens the queue in `path` with explicit configuration.
    pub fn open_with_config(path: &Path, config: StoreConfig) -> QueueResult<Self> {
        let dir = QueueDir::open(path, config.create_if_missing)?;

        let mut backend = FileBackend::open(&dir.log_path())?;
        if let Some(max) = config.max_log_size {
            backend = backend.with_quota(max);
        }

        let mark = dir.load_mark()?;
        let log = QueueLog::new(Box::new(backend), config.sync_on_write);
        let store = Self::recover(log, Some(dir), mark)?;

        info!(
            path = %path.display(),
            pending = store.len(),
            "queue store opened"
        );
        Ok(store)
    }

    /// Creates an empty, non-persistent store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                log: QueueLog::new(Box::new(InMemoryBackend::new()), false),
                dir: None,
                live: BTreeMap::new(),
                next_key: RecordKey::FIRST,
            }),
        }
    }

    /// Opens a store over an arbitrary backend, replaying whatever it holds.
    ///
    /// Without a directory there is no MARK file, so the log is never
    /// compacted and keys stay unique across reopen of the same backend.
    pub fn with_backend(backend: Box<dyn StorageBackend>) -> QueueResult<Self> {
        Self::recover(QueueLog::new(backend, false), None, None)
    }

    fn recover(
        mut log: QueueLog,
        dir: Option<QueueDir>,
        mark: Option<RecordKey>,
    ) -> QueueResult<Self> {
        let replay = log.replay()?;
        let mut live = BTreeMap::new();
        let mut highest: Option<RecordKey> = None;

        for (offset, record) in replay.records {
            if let LogRecord::Append { key, .. } = &record {
                if highest.is_some_and(|h| *key <= h) {
                    return Err(QueueError::corrupted(
                        offset,
                        format!("key {key} is not above {}", highest.unwrap_or(*key)),
                    ));
                }
            }
            if let Some(max) = record.max_key() {
                highest = Some(highest.map_or(max, |h| h.max(max)));
            }

            match record {
                LogRecord::Append { key, payload } => {
                    live.insert(key, serde_json::from_slice(&payload)?);
                }
                LogRecord::Remove { keys } => {
                    for key in keys {
                        live.remove(&key);
                    }
                }
            }
        }

        let next_key = [
            Some(RecordKey::FIRST),
            mark,
            highest.map(RecordKey::next),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(RecordKey::FIRST);

        debug!(
            pending = live.len(),
            next_key = next_key.as_u64(),
            torn_bytes = replay.truncated_bytes,
            "queue log replayed"
        );

        Ok(Self {
            inner: Mutex::new(StoreInner {
                log,
                dir,
                live,
                next_key,
            }),
        })
    }

    /// Queues `payload` and returns its newly assigned key.
    ///
    /// # Errors
    ///
    /// - `InvalidPayload` if `payload` is not a JSON object
    /// - `StorageFull` if the record does not fit
    /// - `StoreUnavailable` on I/O failure
    pub fn append(&self, payload: Value) -> QueueResult<RecordKey> {
        if !payload.is_object() {
            return Err(QueueError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                json_kind(&payload)
            )));
        }
        let bytes = serde_json::to_vec(&payload)?;

        let mut inner = self.inner.lock();
        let key = inner.next_key;
        // A key is burned even if the write fails, so it can never be
        // handed out twice.
        inner.next_key = key.next();

        inner.log.append(&LogRecord::Append {
            key,
            payload: bytes,
        })?;
        inner.live.insert(key, payload);

        info!(key = key.as_u64(), pending = inner.live.len(), "payload queued");
        Ok(key)
    }

    /// Returns every queued record in insertion order.
    pub fn read_all(&self) -> QueueResult<Snapshot> {
        let inner = self.inner.lock();
        let records = inner
            .live
            .iter()
            .map(|(key, payload)| QueuedRecord {
                key: *key,
                payload: payload.clone(),
            })
            .collect();
        Ok(Snapshot { records })
    }

    /// Removes every record currently queued. Returns how many were removed.
    ///
    /// Clearing an empty store is a no-op.
    pub fn clear(&self) -> QueueResult<usize> {
        let mut inner = self.inner.lock();
        let keys: Vec<RecordKey> = inner.live.keys().copied().collect();
        inner.remove(keys)
    }

    /// Removes exactly the records observed by `snapshot`.
    ///
    /// Records appended after the snapshot was taken survive. Keys that are
    /// already gone are skipped.
    pub fn clear_snapshot(&self, snapshot: &Snapshot) -> QueueResult<usize> {
        let mut inner = self.inner.lock();
        let keys: Vec<RecordKey> = snapshot
            .records
            .iter()
            .map(|r| r.key)
            .filter(|key| inner.live.contains_key(key))
            .collect();
        inner.remove(keys)
    }

    /// Number of queued records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().live.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().live.is_empty()
    }

    /// Returns queue statistics.
    pub fn stats(&self) -> QueueResult<QueueStats> {
        let inner = self.inner.lock();
        Ok(QueueStats {
            records: inner.live.len(),
            log_bytes: inner.log.size()?,
            next_key: inner.next_key,
        })
    }
}

impl StoreInner {
    fn remove(&mut self, keys: Vec<RecordKey>) -> QueueResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let count = keys.len();
        self.log.append(&LogRecord::Remove { keys: keys.clone() })?;
        for key in &keys {
            self.live.remove(key);
        }

        info!(removed = count, pending = self.live.len(), "queued payloads removed");

        if self.live.is_empty() {
            self.compact();
        }
        Ok(count)
    }

    /// Drops the log once nothing is pending.
    ///
    /// The MARK must be durable before the log goes, otherwise a reopen
    /// could hand out old keys again. Failures leave the log in place.
    fn compact(&mut self) {
        let Some(dir) = &self.dir else {
            return;
        };

        if let Err(e) = dir.save_mark(self.next_key) {
            warn!(error = %e, "could not persist key mark, skipping compaction");
            return;
        }
        match self.log.reset() {
            Ok(()) => debug!(next_key = self.next_key.as_u64(), "queue log compacted"),
            Err(e) => warn!(error = %e, "queue log compaction failed"),
        }
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("DurableStore")
            .field("pending", &inner.live.len())
            .field("next_key", &inner.next_key)
            .field("persistent", &inner.dir.is_some())
            .finish_non_exhaustive()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbox_storage::{StorageError, StorageResult};
    use serde_json::json;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    /// In-memory log whose flushes and truncates can be made to fail.
    /// Clones share the same bytes, so a store can be reopened over them.
    #[derive(Clone, Default)]
    struct FaultyBackend {
        inner: Arc<Mutex<InMemoryBackend>>,
        failing_flushes: Arc<AtomicUsize>,
        truncate_fails: Arc<AtomicBool>,
    }

    impl FaultyBackend {
        fn fail_next_flush(&self) {
            self.failing_flushes.fetch_add(1, Ordering::SeqCst);
        }

        fn bytes(&self) -> u64 {
            self.inner.lock().size().unwrap()
        }
    }

    impl StorageBackend for FaultyBackend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.inner.lock().read_at(offset, len)
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            self.inner.lock().append(data)
        }

        fn flush(&mut self) -> StorageResult<()> {
            let pending = self.failing_flushes.load(Ordering::SeqCst);
            if pending > 0 {
                self.failing_flushes.store(pending - 1, Ordering::SeqCst);
                return Err(StorageError::Io(io::Error::other("device went away")));
            }
            self.inner.lock().flush()
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.lock().size()
        }

        fn sync(&mut self) -> StorageResult<()> {
            self.inner.lock().sync()
        }

        fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
            if self.truncate_fails.load(Ordering::SeqCst) {
                return Err(StorageError::Io(io::Error::other("truncate refused")));
            }
            self.inner.lock().truncate(new_size)
        }
    }

    #[test]
    fn append_assigns_increasing_keys() {
        let store = DurableStore::in_memory();
        let a = store.append(json!({"pizzaName": "A"})).unwrap();
        let b = store.append(json!({"pizzaName": "B"})).unwrap();
        assert_eq!(a, RecordKey::FIRST);
        assert!(b > a);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let store = DurableStore::in_memory();
        let err = store.append(json!(["not", "an", "object"])).unwrap_err();
        assert!(matches!(err, QueueError::InvalidPayload(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn read_all_is_ordered_snapshot() {
        let store = DurableStore::in_memory();
        store.append(json!({"pizzaName": "A"})).unwrap();
        store.append(json!({"pizzaName": "B"})).unwrap();

        let snapshot = store.read_all().unwrap();
        store.append(json!({"pizzaName": "C"})).unwrap();

        assert_eq!(
            snapshot.payloads(),
            vec![json!({"pizzaName": "A"}), json!({"pizzaName": "B"})]
        );
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn clear_snapshot_keeps_later_appends() {
        let store = DurableStore::in_memory();
        store.append(json!({"pizzaName": "A"})).unwrap();
        let snapshot = store.read_all().unwrap();
        let late = store.append(json!({"pizzaName": "late"})).unwrap();

        assert_eq!(store.clear_snapshot(&snapshot).unwrap(), 1);

        let remaining = store.read_all().unwrap();
        assert_eq!(remaining.keys(), vec![late]);
    }

    #[test]
    fn clear_without_snapshot_removes_everything() {
        let store = DurableStore::in_memory();
        store.append(json!({"pizzaName": "A"})).unwrap();
        store.append(json!({"pizzaName": "B"})).unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn clear_is_idempotent() {
        let store = DurableStore::in_memory();
        store.append(json!({"pizzaName": "A"})).unwrap();

        assert_eq!(store.clear().unwrap(), 1);
        assert_eq!(store.clear().unwrap(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn keys_not_reused_after_clear() {
        let store = DurableStore::in_memory();
        let first = store.append(json!({"n": 1})).unwrap();
        store.clear().unwrap();
        let second = store.append(json!({"n": 2})).unwrap();
        assert!(second > first);
    }

    #[test]
    fn storage_full_is_surfaced() {
        let store = DurableStore::with_backend(Box::new(InMemoryBackend::with_capacity(64))).unwrap();
        store.append(json!({"pizzaName": "A"})).unwrap();

        let big = json!({"pizzaName": "x".repeat(128)});
        let err = store.append(big).unwrap_err();
        assert!(err.is_storage_full());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unflushed_append_is_rolled_back() {
        let backend = FaultyBackend::default();
        let store = DurableStore::with_backend(Box::new(backend.clone())).unwrap();

        backend.fail_next_flush();
        let err = store.append(json!({"pizzaName": "lost"})).unwrap_err();
        assert!(matches!(err, QueueError::StoreUnavailable(_)));
        assert!(store.is_empty());
        assert_eq!(backend.bytes(), 0);

        // The store keeps working, and the failed payload never comes back.
        let kept = store.append(json!({"pizzaName": "kept"})).unwrap();
        assert_eq!(kept, RecordKey::new(2));
        drop(store);

        let reopened = DurableStore::with_backend(Box::new(backend)).unwrap();
        assert_eq!(
            reopened.read_all().unwrap().payloads(),
            vec![json!({"pizzaName": "kept"})]
        );
    }

    #[test]
    fn failed_rollback_refuses_further_writes() {
        let backend = FaultyBackend::default();
        let store = DurableStore::with_backend(Box::new(backend.clone())).unwrap();

        backend.fail_next_flush();
        backend.truncate_fails.store(true, Ordering::SeqCst);
        let err = store.append(json!({"pizzaName": "A"})).unwrap_err();
        assert!(matches!(err, QueueError::StoreUnavailable(_)));

        // Flushing works again, but the log tail is unknown.
        let err = store.append(json!({"pizzaName": "B"})).unwrap_err();
        assert!(matches!(err, QueueError::StoreUnavailable(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn reopen_keeps_records_and_keys() {
        let dir = tempdir().unwrap();

        let last = {
            let store = DurableStore::open(dir.path()).unwrap();
            store.append(json!({"pizzaName": "A"})).unwrap();
            store.append(json!({"pizzaName": "B"})).unwrap()
        };

        let store = DurableStore::open(dir.path()).unwrap();
        let snapshot = store.read_all().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(store.append(json!({"pizzaName": "C"})).unwrap() > last);
    }

    #[test]
    fn compaction_preserves_key_mark() {
        let dir = tempdir().unwrap();

        let last = {
            let store = DurableStore::open(dir.path()).unwrap();
            store.append(json!({"pizzaName": "A"})).unwrap();
            let last = store.append(json!({"pizzaName": "B"})).unwrap();
            store.clear().unwrap();
            assert_eq!(store.stats().unwrap().log_bytes, 0);
            last
        };

        let store = DurableStore::open(dir.path()).unwrap();
        assert!(store.is_empty());
        assert!(store.append(json!({"pizzaName": "C"})).unwrap() > last);
    }

    #[test]
    fn stats_reports_pending_and_next_key() {
        let store = DurableStore::in_memory();
        store.append(json!({"pizzaName": "A"})).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.records, 1);
        assert_eq!(stats.next_key, RecordKey::new(2));
        assert!(stats.log_bytes > 0);
    }
}
