//! Memoization settings and the process-wide context
//!
//! Per-function behavior lives in [`MemoSettings`]. Process-wide state, the
//! default cache directory and the record of which entries have already been
//! overwritten, lives in a [`MemoContext`] that every wrapper captures when it
//! is built. Changing the default directory afterwards does not move entries
//! of wrappers that already exist.

use crate::encode::DEFAULT_MAX_TOKEN_LENGTH;
use crate::key::DEFAULT_MAX_KEY_LENGTH;
use crate::paths::FunctionId;
use crate::store::DEFAULT_LOCK_TIMEOUT;
use crate::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Environment variable consulted for the default cache directory
pub const CACHE_DIR_ENV: &str = "MEMOJAR_CACHE_DIR";

/// Where results are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StoreMode {
    /// Process-local memory only
    Memory,
    /// Blob files on disk
    #[default]
    Disk,
    /// Memory first, then disk
    Both,
}

impl StoreMode {
    /// Whether the memory store is consulted
    #[must_use]
    pub const fn uses_memory(self) -> bool {
        matches!(self, Self::Memory | Self::Both)
    }

    /// Whether the disk store is consulted
    #[must_use]
    pub const fn uses_disk(self) -> bool {
        matches!(self, Self::Disk | Self::Both)
    }

    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(Self::Memory),
            "disk" => Ok(Self::Disk),
            "both" => Ok(Self::Both),
            other => Err(Error::configuration(format!(
                "invalid store `{other}`, must be one of 'disk', 'memory' or 'both'"
            ))),
        }
    }
}

impl TryFrom<String> for StoreMode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<StoreMode> for String {
    fn from(mode: StoreMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Per-function memoization settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoSettings {
    /// Fixed entry file name, ignoring the arguments
    pub cache_file: Option<String>,
    /// Cache root for this function, overriding the context default
    pub cache_dir: Option<PathBuf>,
    /// Bypass the cache entirely
    pub disabled: bool,
    /// Backends to use
    pub store: StoreMode,
    /// Recompute each key once per process before trusting the cache
    pub overwrite: bool,
    /// Log cache events at info instead of debug
    pub verbose: bool,
    /// Longest cache key kept verbatim
    pub max_key_length: usize,
    /// Longest argument token kept verbatim
    pub max_token_length: usize,
    /// Number of shard directories, 0 for none
    pub shard_count: u32,
    /// How long to wait for an entry lock, in milliseconds
    pub lock_timeout_ms: u64,
}

impl Default for MemoSettings {
    fn default() -> Self {
        Self {
            cache_file: None,
            cache_dir: None,
            disabled: false,
            store: StoreMode::default(),
            overwrite: false,
            verbose: false,
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
            shard_count: 0,
            lock_timeout_ms: u64::try_from(DEFAULT_LOCK_TIMEOUT.as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

impl MemoSettings {
    /// Lock timeout as a duration
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Reject settings no wrapper can work with
    pub fn validate(&self) -> Result<()> {
        if self.max_key_length == 0 {
            return Err(Error::configuration("max_key_length must be non-zero"));
        }
        if self.max_token_length == 0 {
            return Err(Error::configuration("max_token_length must be non-zero"));
        }
        if let Some(file) = &self.cache_file {
            let mut components = Path::new(file).components();
            let single = matches!(
                (components.next(), components.next()),
                (Some(std::path::Component::Normal(_)), None)
            );
            if !single {
                return Err(Error::configuration(format!(
                    "cache_file `{file}` must be a plain file name"
                )));
            }
        }
        Ok(())
    }
}

/// Keys already recomputed by overwrite-mode wrappers in this process
#[derive(Debug, Default)]
pub struct OverwriteTracker {
    done: Mutex<HashSet<(FunctionId, String)>>,
}

impl OverwriteTracker {
    /// Whether `key` of `function` was already recomputed
    pub fn is_done(&self, function: &FunctionId, key: &str) -> bool {
        self.done
            .lock()
            .contains(&(function.clone(), key.to_string()))
    }

    /// Record that `key` of `function` has been recomputed
    pub fn mark_done(&self, function: &FunctionId, key: &str) {
        self.done.lock().insert((function.clone(), key.to_string()));
    }
}

/// Process-wide configuration shared by wrappers
#[derive(Debug, Clone, Default)]
pub struct MemoContext {
    cache_dir: Option<PathBuf>,
    overwritten: Arc<OverwriteTracker>,
}

static DEFAULT_CACHE_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();
static GLOBAL_CONTEXT: OnceLock<MemoContext> = OnceLock::new();

/// Set the default cache directory of the global context.
///
/// Must happen once, before the first wrapper is built with the global
/// context. Fails if the default was already set or already read.
pub fn set_default_cache_dir(dir: impl Into<PathBuf>) -> Result<()> {
    DEFAULT_CACHE_DIR
        .set(Some(dir.into()))
        .map_err(|_| Error::configuration("the default cache directory is already fixed"))
}

/// Default cache directory of the global context, if any
pub fn default_cache_dir() -> Option<&'static Path> {
    DEFAULT_CACHE_DIR
        .get_or_init(|| cache_dir_from_env(std::env::var(CACHE_DIR_ENV).ok()))
        .as_deref()
}

fn cache_dir_from_env(value: Option<String>) -> Option<PathBuf> {
    value
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

impl MemoContext {
    /// Isolated context without a default cache directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared process-wide context
    pub fn global() -> &'static Self {
        GLOBAL_CONTEXT.get_or_init(|| Self {
            cache_dir: default_cache_dir().map(Path::to_path_buf),
            overwritten: Arc::default(),
        })
    }

    /// Use `dir` as the default cache root
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Default cache root, if any
    #[must_use]
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Overwrite bookkeeping shared by wrappers of this context
    #[must_use]
    pub fn overwritten(&self) -> &OverwriteTracker {
        &self.overwritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_mode_parses_known_names() {
        assert_eq!("memory".parse::<StoreMode>().unwrap(), StoreMode::Memory);
        assert_eq!("disk".parse::<StoreMode>().unwrap(), StoreMode::Disk);
        assert_eq!("both".parse::<StoreMode>().unwrap(), StoreMode::Both);
    }

    #[test]
    fn unknown_store_mode_is_invalid_configuration() {
        let err = "redis".parse::<StoreMode>().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
        assert!(err.to_string().contains("redis"));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: MemoSettings =
            serde_json::from_str(r#"{"store": "both", "shard_count": 16}"#).unwrap();
        assert_eq!(settings.store, StoreMode::Both);
        assert_eq!(settings.shard_count, 16);
        assert_eq!(settings.max_token_length, DEFAULT_MAX_TOKEN_LENGTH);
        assert!(!settings.disabled);
    }

    #[test]
    fn default_lock_timeout_matches_store_default() {
        let settings = MemoSettings::default();
        assert_eq!(settings.lock_timeout(), DEFAULT_LOCK_TIMEOUT);
        assert_eq!(settings.lock_timeout_ms, 60_000);
    }

    #[test]
    fn settings_reject_unknown_store() {
        let result = serde_json::from_str::<MemoSettings>(r#"{"store": "cloud"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_zero_lengths() {
        let settings = MemoSettings {
            max_key_length: 0,
            ..MemoSettings::default()
        };
        assert!(settings.validate().is_err());
        let settings = MemoSettings {
            max_token_length: 0,
            ..MemoSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_nested_cache_file() {
        let settings = MemoSettings {
            cache_file: Some("../escape.json".to_string()),
            ..MemoSettings::default()
        };
        assert!(settings.validate().is_err());
        let settings = MemoSettings {
            cache_file: Some("result.json".to_string()),
            ..MemoSettings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn env_value_must_be_non_empty() {
        assert_eq!(cache_dir_from_env(None), None);
        assert_eq!(cache_dir_from_env(Some("  ".to_string())), None);
        assert_eq!(
            cache_dir_from_env(Some("/var/cache/jar".to_string())),
            Some(PathBuf::from("/var/cache/jar"))
        );
    }

    #[test]
    fn tracker_is_keyed_by_function_and_key() {
        let tracker = OverwriteTracker::default();
        let f = FunctionId::new("a.rs", "f");
        let g = FunctionId::new("a.rs", "g");
        tracker.mark_done(&f, "k");
        assert!(tracker.is_done(&f, "k"));
        assert!(!tracker.is_done(&g, "k"));
        assert!(!tracker.is_done(&f, "other"));
    }

    #[test]
    fn cloned_contexts_share_tracker() {
        let ctx = MemoContext::new().with_cache_dir("/tmp/jar");
        let clone = ctx.clone();
        let f = FunctionId::new("a.rs", "f");
        ctx.overwritten().mark_done(&f, "k");
        assert!(clone.overwritten().is_done(&f, "k"));
        assert_eq!(clone.cache_dir(), Some(Path::new("/tmp/jar")));
    }
}
