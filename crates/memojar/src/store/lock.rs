//! Advisory per-path file locks

use crate::{Error, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Lock file name used when the locked path is a directory
pub const DIR_LOCK_FILE: &str = ".lock";

const INITIAL_BACKOFF: Duration = Duration::from_millis(5);
const MAX_BACKOFF: Duration = Duration::from_millis(200);

/// Lock file guarding `path`: `<path>.lock` next to a file entry, or a lock
/// file inside the directory when `path` is a directory.
#[must_use]
pub fn lock_path_for(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(DIR_LOCK_FILE)
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Shared,
    Exclusive,
}

/// Held advisory lock; released when dropped
#[derive(Debug)]
pub struct PathLock {
    file: File,
    path: PathBuf,
}

impl PathLock {
    /// Acquire a shared lock (readers) on `path`
    pub fn shared(path: &Path, timeout: Duration) -> Result<Self> {
        Self::acquire(path, timeout, Mode::Shared)
    }

    /// Acquire an exclusive lock (writers) on `path`
    pub fn exclusive(path: &Path, timeout: Duration) -> Result<Self> {
        Self::acquire(path, timeout, Mode::Exclusive)
    }

    /// Lock file backing this guard
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn acquire(path: &Path, timeout: Duration, mode: Mode) -> Result<Self> {
        let lock_path = lock_path_for(path);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| Error::io(e, &lock_path, "open lock"))?;

        let start = Instant::now();
        let mut delay = INITIAL_BACKOFF;
        loop {
            let acquired = match mode {
                Mode::Shared => FileExt::try_lock_shared(&file),
                Mode::Exclusive => FileExt::try_lock_exclusive(&file),
            }
            .map_err(|e| Error::io(e, &lock_path, "lock"))?;

            if acquired {
                return Ok(Self {
                    file,
                    path: lock_path,
                });
            }

            let waited = start.elapsed();
            if waited >= timeout {
                return Err(Error::lock_timeout(&lock_path, waited));
            }
            tracing::trace!(
                lock = %lock_path.display(),
                ?mode,
                "Lock busy, retrying in {:?}",
                delay
            );
            thread::sleep(delay.min(timeout.saturating_sub(waited)));
            delay = (delay * 2).min(MAX_BACKOFF);
        }
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well; unlock eagerly so a
        // waiter is not held up by a delayed close.
        let _ = FileExt::unlock(&self.file);
    }
}
