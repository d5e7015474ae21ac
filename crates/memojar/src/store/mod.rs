//! Store backends
//!
//! - [`MemoryStore`]: process-local values keyed by function then cache key
//! - [`DiskStore`]: one blob file per entry, guarded by [`PathLock`]

mod disk;
mod lock;
mod memory;

pub use disk::{DEFAULT_LOCK_TIMEOUT, DiskStore};
pub use lock::{DIR_LOCK_FILE, PathLock, lock_path_for};
pub use memory::MemoryStore;
