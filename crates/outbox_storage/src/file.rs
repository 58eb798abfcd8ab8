//! File-based storage backend for persistent queues.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A queue log kept in a single file.
///
/// Opening a path that does not exist yet creates the file, so the first
/// open of a fresh queue never fails for lack of a container.
///
/// The logical length is tracked in memory and every append is written at
/// that offset, never at the physical end of the file. A failed append is
/// cut back to its starting offset. If even that cut fails, the backend
/// remembers the torn tail and removes it before accepting the next append.
///
/// [`FileBackend::with_quota`] caps the logical length; an append that
/// would exceed it fails with [`StorageError::Full`] without touching disk.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    len: u64,
    quota: Option<u64>,
    torn: bool,
}

impl FileBackend {
    /// Opens the file at `path`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            len,
            quota: None,
            torn: false,
        })
    }

    /// Like [`FileBackend::open`], creating missing parent directories first.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Caps the log at `max_bytes`.
    #[must_use]
    pub fn with_quota(mut self, max_bytes: u64) -> Self {
        self.quota = Some(max_bytes);
        self
    }

    /// The configured quota, if any.
    #[must_use]
    pub fn quota(&self) -> Option<u64> {
        self.quota
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cuts the file back to the logical length after a failed rollback.
    fn repair_tail(&mut self) -> StorageResult<()> {
        self.file.get_mut().set_len(self.len)?;
        self.torn = false;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let end = offset.saturating_add(len as u64);
        if end > self.len {
            return Err(StorageError::ReadPastEnd {
                offset,
                len,
                size: self.len,
            });
        }

        let mut buffer = vec![0u8; len];
        if len > 0 {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buffer)?;
        }
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.len;
        if data.is_empty() {
            return Ok(offset);
        }

        if let Some(quota) = self.quota {
            let available = quota.saturating_sub(offset);
            if data.len() as u64 > available {
                return Err(StorageError::Full {
                    requested: data.len() as u64,
                    available,
                });
            }
        }

        if self.torn {
            self.repair_tail()?;
        }

        let file = self.file.get_mut();
        let written = match file.seek(SeekFrom::Start(offset)) {
            Ok(_) => file.write_all(data),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if file.set_len(offset).is_err() {
                self.torn = true;
            }
            return Err(e.into());
        }

        self.len += data.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.get_mut().flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.len)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.get_mut().sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if new_size > self.len {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size: self.len,
            });
        }

        let file = self.file.get_mut();
        file.set_len(new_size)?;
        file.sync_all()?;
        self.len = new_size;
        self.torn = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn first_open_creates_empty_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.log");

        drop(FileBackend::open(&path).unwrap());
        assert!(path.exists());

        // Opening again neither fails nor truncates.
        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
    }

    #[test]
    fn frames_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.log");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            assert_eq!(backend.append(b"frame-one").unwrap(), 0);
            assert_eq!(backend.append(b"frame-two").unwrap(), 9);
            backend.sync().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 18);
        assert_eq!(backend.read_at(9, 9).unwrap(), b"frame-two");
        assert!(matches!(
            backend.read_at(10, 9),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn nested_queue_directory_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("outbox").join("pizza").join("queue.log");

        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        assert_eq!(backend.path(), path);
    }

    #[test]
    fn quota_rejects_without_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.log");

        let mut backend = FileBackend::open(&path).unwrap().with_quota(8);
        backend.append(b"12345").unwrap();

        let err = backend.append(b"6789").unwrap_err();
        assert!(matches!(
            err,
            StorageError::Full {
                requested: 4,
                available: 3
            }
        ));
        assert_eq!(fs::metadata(&path).unwrap().len(), 5);
    }

    #[test]
    fn append_lands_at_logical_end_not_physical_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.log");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"good").unwrap();

        // Stray bytes past the logical end, as left by a failed rollback.
        let mut raw = OpenOptions::new().append(true).open(&path).unwrap();
        raw.write_all(b"torn-garbage").unwrap();
        drop(raw);
        backend.torn = true;

        assert_eq!(backend.append(b"next").unwrap(), 4);
        assert!(!backend.torn);
        assert_eq!(fs::read(&path).unwrap(), b"goodnext");
    }

    #[test]
    fn truncate_drops_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.log");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"keep-drop").unwrap();
        backend.truncate(4).unwrap();
        assert_eq!(backend.read_at(0, 4).unwrap(), b"keep");
        assert_eq!(fs::metadata(&path).unwrap().len(), 4);

        assert!(matches!(
            backend.truncate(50),
            Err(StorageError::TruncateBeyondEnd { .. })
        ));
    }
}
