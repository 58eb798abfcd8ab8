//! Queue directory management.
//!
//! The LOCK file makes sure a queue directory is opened by exactly one store
//! handle at a time. The MARK file persists the key high-water mark so keys
//! are never reused after the log is compacted away.

use crate::error::{QueueError, QueueResult};
use crate::types::RecordKey;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const MARK_FILE: &str = "MARK";
const MARK_TEMP: &str = "MARK.tmp";
const LOG_FILE: &str = "queue.log";

/// An opened, exclusively locked queue directory.
#[derive(Debug)]
pub(crate) struct QueueDir {
    path: PathBuf,
    _lock_file: File,
}

impl QueueDir {
    /// Opens or creates a queue directory and takes its lock.
    ///
    /// # Errors
    ///
    /// - `StoreUnavailable` if the directory is missing and
    ///   `create_if_missing` is false, or on I/O failure
    /// - `Locked` if another handle holds the directory
    pub fn open(path: &Path, create_if_missing: bool) -> QueueResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("queue directory does not exist: {}", path.display()),
                )
                .into());
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(QueueError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Loads the persisted next key, if one was ever written.
    pub fn load_mark(&self) -> QueueResult<Option<RecordKey>> {
        let mark_path = self.path.join(MARK_FILE);
        if !mark_path.exists() {
            return Ok(None);
        }

        let data = fs::read(&mark_path)?;
        let bytes: [u8; 8] = data
            .as_slice()
            .try_into()
            .map_err(|_| QueueError::corrupted(0, format!("MARK holds {} bytes", data.len())))?;
        Ok(Some(RecordKey::new(u64::from_le_bytes(bytes))))
    }

    /// Persists the next key with write-then-rename.
    pub fn save_mark(&self, next_key: RecordKey) -> QueueResult<()> {
        let temp_path = self.path.join(MARK_TEMP);

        let mut file = File::create(&temp_path)?;
        file.write_all(&next_key.as_u64().to_le_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.path.join(MARK_FILE))?;
        self.sync_directory()
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> QueueResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> QueueResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let root = tempdir().unwrap();
        let path = root.path().join("outbox");

        let dir = QueueDir::open(&path, true).unwrap();
        assert!(path.join(LOCK_FILE).exists());
        assert_eq!(dir.log_path(), path.join(LOG_FILE));
    }

    #[test]
    fn open_missing_without_create_fails() {
        let root = tempdir().unwrap();
        let result = QueueDir::open(&root.path().join("absent"), false);
        assert!(matches!(result, Err(QueueError::StoreUnavailable(_))));
    }

    #[test]
    fn second_open_is_locked() {
        let root = tempdir().unwrap();
        let _first = QueueDir::open(root.path(), true).unwrap();
        let second = QueueDir::open(root.path(), true);
        assert!(matches!(second, Err(QueueError::Locked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let root = tempdir().unwrap();
        drop(QueueDir::open(root.path(), true).unwrap());
        assert!(QueueDir::open(root.path(), true).is_ok());
    }

    #[test]
    fn mark_roundtrip() {
        let root = tempdir().unwrap();
        let dir = QueueDir::open(root.path(), true).unwrap();
        assert_eq!(dir.load_mark().unwrap(), None);

        dir.save_mark(RecordKey::new(17)).unwrap();
        assert_eq!(dir.load_mark().unwrap(), Some(RecordKey::new(17)));
        assert!(!root.path().join(MARK_TEMP).exists());
    }
}
