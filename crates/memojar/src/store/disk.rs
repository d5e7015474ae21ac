//! Disk store: one blob file per entry, guarded by advisory locks

use super::lock::PathLock;
use crate::codec::BlobCodec;
use crate::{Error, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;

/// Default time to wait for an entry lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Blob-file store parameterized by a codec
#[derive(Debug, Clone)]
pub struct DiskStore<T, C> {
    codec: C,
    lock_timeout: Duration,
    _value: PhantomData<fn() -> T>,
}

impl<T, C: BlobCodec<T>> DiskStore<T, C> {
    /// Create a store
    #[must_use]
    pub const fn new(codec: C, lock_timeout: Duration) -> Self {
        Self {
            codec,
            lock_timeout,
            _value: PhantomData,
        }
    }

    /// File extension of entries written by this store
    #[must_use]
    pub fn extension(&self) -> String {
        self.codec.extension()
    }

    /// Read the entry at `path`.
    ///
    /// A missing entry and an entry that fails to decode are both misses; the
    /// latter is logged and left for the next write to replace.
    pub fn get(&self, path: &Path) -> Result<Option<T>> {
        let Some(parent) = path.parent() else {
            return Ok(None);
        };
        if !parent.is_dir() {
            return Ok(None);
        }

        let _lock = PathLock::shared(path, self.lock_timeout)?;
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(e, path, "read")),
        };

        match self.codec.decode(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(Error::CorruptBlob { message }) => {
                tracing::warn!(
                    path = %path.display(),
                    "Failed to read cached entry, recomputing: {message}"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Write `value` to `path`, creating parent directories as needed.
    ///
    /// The blob goes to a temporary file in the same directory first and is
    /// then moved over the entry, so readers see either the old or the new
    /// blob.
    pub fn put(&self, path: &Path, value: &T) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::configuration(format!("{} has no parent", path.display())))?;
        fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;

        let bytes = self.codec.encode(value)?;

        let _lock = PathLock::exclusive(path, self.lock_timeout)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| Error::io(e, parent, "create temp file"))?;
        tmp.write_all(&bytes)
            .map_err(|e| Error::io(e, tmp.path(), "write"))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::io(e, tmp.path(), "sync_all"))?;
        tmp.persist(path)
            .map_err(|e| Error::io(e.error, path, "persist"))?;
        Ok(())
    }

    /// Remove the directory `dir` and everything below it.
    ///
    /// Returns whether anything was removed.
    pub fn clear(&self, dir: &Path) -> Result<bool> {
        if !dir.is_dir() {
            return Ok(false);
        }
        let _lock = PathLock::exclusive(dir, self.lock_timeout)?;
        match fs::remove_dir_all(dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(e, dir, "remove_dir_all")),
        }
    }
}
