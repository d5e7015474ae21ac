//! The memoizing wrapper
//!
//! [`Memo`] holds everything needed to cache one function: its identity and
//! signature, settings, and the stores. A call goes through two steps shared
//! by the synchronous and asynchronous entry points:
//!
//! 1. `begin` binds the arguments, derives the key and entry path, and
//!    consults the stores. A hit ends the call.
//! 2. On a miss the caller runs the function however it likes (directly or by
//!    awaiting it) and hands the result to `complete`, which writes it back.
//!
//! [`Memoized`] bundles a `Memo` with the function it wraps.

use crate::codec::{BlobCodec, JsonCodec};
use crate::config::{MemoContext, MemoSettings, StoreMode};
use crate::encode::ArgEncoder;
use crate::key::KeyComposer;
use crate::paths::{self, FunctionId};
use crate::signature::{BoundCall, CallArgs, Signature};
use crate::store::{DiskStore, MemoryStore};
use crate::{Error, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Emit a wrapper event at info when verbose, at debug otherwise
macro_rules! memo_event {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

enum Lookup<T> {
    Hit(T),
    Miss(Pending),
}

struct Pending {
    bound: BoundCall,
    /// `None` when caching is disabled
    key: Option<String>,
    path: Option<PathBuf>,
    started: Instant,
}

/// Caching engine for one function
pub struct Memo<T, C = JsonCodec> {
    id: FunctionId,
    signature: Signature,
    settings: MemoSettings,
    composer: KeyComposer,
    root: PathBuf,
    context: MemoContext,
    memory: Arc<MemoryStore<T>>,
    disk: DiskStore<T, C>,
}

impl<T, C> std::fmt::Debug for Memo<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl<T> Memo<T, JsonCodec> {
    /// Start configuring a memo for `id` with the given parameter list
    #[must_use]
    pub fn builder(id: FunctionId, signature: Signature) -> MemoBuilder<T, JsonCodec> {
        MemoBuilder {
            id,
            signature,
            settings: MemoSettings::default(),
            context: None,
            memory: None,
            codec: JsonCodec,
        }
    }
}

impl<T, C> Memo<T, C> {
    /// Identity of the wrapped function
    #[must_use]
    pub fn id(&self) -> &FunctionId {
        &self.id
    }

    /// Effective settings
    #[must_use]
    pub fn settings(&self) -> &MemoSettings {
        &self.settings
    }

    /// Cache root this memo writes under
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every disk entry of this function
    #[must_use]
    pub fn function_dir(&self) -> PathBuf {
        paths::function_dir(&self.root, &self.id)
    }
}

impl<T: Clone, C: BlobCodec<T>> Memo<T, C> {
    /// Cache key of a call
    pub fn cache_key(&self, args: &CallArgs) -> Result<String> {
        let bound = self.signature.bind(self.id.name(), args)?;
        Ok(self.composer.compose(&bound))
    }

    /// Disk location a call's result is (or would be) stored at
    pub fn entry_path(&self, args: &CallArgs) -> Result<PathBuf> {
        let key = self.cache_key(args)?;
        Ok(self.path_for_key(&key))
    }

    fn path_for_key(&self, key: &str) -> PathBuf {
        if let Some(file) = &self.settings.cache_file {
            return self.function_dir().join(file);
        }
        paths::entry_path(
            &self.root,
            &self.id,
            key,
            self.settings.shard_count,
            &self.disk.extension(),
        )
    }

    /// Return the cached result of `args`, or run `f` and cache its result
    pub fn call<F>(&self, args: &CallArgs, f: F) -> Result<T>
    where
        F: FnOnce(&BoundCall) -> T,
    {
        self.try_call(args, |bound| Ok::<T, Error>(f(bound)))
    }

    /// Like [`Memo::call`] for fallible functions. Errors are passed through
    /// and never cached.
    pub fn try_call<F, E>(&self, args: &CallArgs, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&BoundCall) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        match self.begin(args)? {
            Lookup::Hit(value) => Ok(value),
            Lookup::Miss(pending) => {
                let value = f(&pending.bound)?;
                self.complete(pending, &value)?;
                Ok(value)
            }
        }
    }

    /// Asynchronous [`Memo::call`]. Disk access still blocks the current thread.
    pub async fn call_async<F, Fut>(&self, args: &CallArgs, f: F) -> Result<T>
    where
        F: FnOnce(BoundCall) -> Fut,
        Fut: Future<Output = T>,
    {
        self.try_call_async(args, |bound| {
            let fut = f(bound);
            async move { Ok::<T, Error>(fut.await) }
        })
        .await
    }

    /// Asynchronous [`Memo::try_call`]
    pub async fn try_call_async<F, Fut, E>(
        &self,
        args: &CallArgs,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(BoundCall) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<Error>,
    {
        match self.begin(args)? {
            Lookup::Hit(value) => Ok(value),
            Lookup::Miss(pending) => {
                let value = f(pending.bound.clone()).await?;
                self.complete(pending, &value)?;
                Ok(value)
            }
        }
    }

    fn begin(&self, args: &CallArgs) -> Result<Lookup<T>> {
        let started = Instant::now();
        let bound = self.signature.bind(self.id.name(), args)?;
        if self.settings.disabled {
            return Ok(Lookup::Miss(Pending {
                bound,
                key: None,
                path: None,
                started,
            }));
        }

        let key = self.composer.compose(&bound);
        let store = self.settings.store;
        let path = store.uses_disk().then(|| self.path_for_key(&key));
        let name = self.id.name();

        let forced =
            self.settings.overwrite && !self.context.overwritten().is_done(&self.id, &key);
        if forced {
            memo_event!(
                self.settings.verbose,
                function = name,
                key = %key,
                "Overwriting cached output on first call in this process"
            );
        } else {
            if store.uses_memory()
                && let Some(value) = self.memory.get(name, &key)
            {
                memo_event!(
                    self.settings.verbose,
                    function = name,
                    key = %key,
                    elapsed = ?started.elapsed(),
                    "Using output cached in memory"
                );
                return Ok(Lookup::Hit(value));
            }

            if let Some(path) = &path
                && let Some(value) = self.disk.get(path)?
            {
                memo_event!(
                    self.settings.verbose,
                    function = name,
                    path = %path.display(),
                    elapsed = ?started.elapsed(),
                    "Using output cached on disk"
                );
                if store.uses_memory() {
                    self.memory.insert(name, &key, value.clone());
                }
                return Ok(Lookup::Hit(value));
            }
        }

        Ok(Lookup::Miss(Pending {
            bound,
            key: Some(key),
            path,
            started,
        }))
    }

    fn complete(&self, pending: Pending, value: &T) -> Result<()> {
        let Some(key) = pending.key else {
            return Ok(());
        };
        let name = self.id.name();

        if let Some(path) = &pending.path {
            self.disk.put(path, value)?;
        }
        if self.settings.store.uses_memory() {
            self.memory.insert(name, &key, value.clone());
        }
        if self.settings.overwrite {
            self.context.overwritten().mark_done(&self.id, &key);
        }

        memo_event!(
            self.settings.verbose,
            function = name,
            key = %key,
            store = %self.settings.store,
            path = ?pending.path,
            elapsed = ?pending.started.elapsed(),
            "Executed and cached output"
        );
        Ok(())
    }

    /// Remove every cached result of this function from the configured stores
    pub fn clear(&self) -> Result<()> {
        let started = Instant::now();
        let store = self.settings.store;
        if store.uses_memory() {
            self.memory.remove_function(self.id.name());
        }
        if store.uses_disk() {
            self.disk.clear(&self.function_dir())?;
        }
        memo_event!(
            self.settings.verbose,
            function = self.id.name(),
            store = %store,
            elapsed = ?started.elapsed(),
            "Cleared cache"
        );
        Ok(())
    }
}

/// Configuration builder for [`Memo`]
pub struct MemoBuilder<T, C = JsonCodec> {
    id: FunctionId,
    signature: Signature,
    settings: MemoSettings,
    context: Option<MemoContext>,
    memory: Option<Arc<MemoryStore<T>>>,
    codec: C,
}

impl<T, C> MemoBuilder<T, C> {
    /// Replace all settings at once
    #[must_use]
    pub fn settings(mut self, settings: MemoSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Store every call's result in one fixed file name
    #[must_use]
    pub fn cache_file(mut self, name: impl Into<String>) -> Self {
        self.settings.cache_file = Some(name.into());
        self
    }

    /// Cache root for this function
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.cache_dir = Some(dir.into());
        self
    }

    /// Bypass caching
    #[must_use]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.settings.disabled = disabled;
        self
    }

    /// Backends to use
    #[must_use]
    pub fn store(mut self, store: StoreMode) -> Self {
        self.settings.store = store;
        self
    }

    /// Recompute each key once per process before trusting the cache
    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.settings.overwrite = overwrite;
        self
    }

    /// Log cache events at info level
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.settings.verbose = verbose;
        self
    }

    /// Longest cache key kept verbatim
    #[must_use]
    pub fn max_key_length(mut self, len: usize) -> Self {
        self.settings.max_key_length = len;
        self
    }

    /// Longest argument token kept verbatim
    #[must_use]
    pub fn max_token_length(mut self, len: usize) -> Self {
        self.settings.max_token_length = len;
        self
    }

    /// Spread entries over `count` shard directories
    #[must_use]
    pub fn shard_count(mut self, count: u32) -> Self {
        self.settings.shard_count = count;
        self
    }

    /// How long to wait for an entry lock
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.settings.lock_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Use `context` instead of the global one
    #[must_use]
    pub fn context(mut self, context: MemoContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Share a memory store with other memos of the same value type
    #[must_use]
    pub fn memory_store(mut self, store: Arc<MemoryStore<T>>) -> Self {
        self.memory = Some(store);
        self
    }

    /// Use another blob codec for disk entries
    #[must_use]
    pub fn codec<C2>(self, codec: C2) -> MemoBuilder<T, C2> {
        MemoBuilder {
            id: self.id,
            signature: self.signature,
            settings: self.settings,
            context: self.context,
            memory: self.memory,
            codec,
        }
    }

    /// Validate the settings and build the memo
    pub fn build(self) -> Result<Memo<T, C>>
    where
        T: Clone,
        C: BlobCodec<T>,
    {
        self.settings.validate()?;
        let context = self
            .context
            .unwrap_or_else(|| MemoContext::global().clone());
        let root = paths::cache_root(
            self.settings.cache_dir.as_deref(),
            context.cache_dir(),
            &self.id,
        );
        let composer = KeyComposer::new(
            ArgEncoder::new(self.settings.max_token_length),
            self.settings.max_key_length,
        );
        let disk = DiskStore::new(self.codec, self.settings.lock_timeout());

        tracing::debug!(
            function = self.id.name(),
            root = %root.display(),
            store = %self.settings.store,
            "Memoizing function"
        );

        Ok(Memo {
            id: self.id,
            signature: self.signature,
            settings: self.settings,
            composer,
            root,
            context,
            memory: self.memory.unwrap_or_default(),
            disk,
        })
    }

    /// Build the memo and attach a synchronous function
    pub fn wrap<F>(self, func: F) -> Result<Memoized<F, T, C>>
    where
        F: Fn(&BoundCall) -> T,
        T: Clone,
        C: BlobCodec<T>,
    {
        Ok(Memoized {
            memo: self.build()?,
            func,
        })
    }

    /// Build the memo and attach an asynchronous function
    pub fn wrap_async<F, Fut>(self, func: F) -> Result<Memoized<F, T, C>>
    where
        F: Fn(BoundCall) -> Fut,
        Fut: Future<Output = T>,
        T: Clone,
        C: BlobCodec<T>,
    {
        Ok(Memoized {
            memo: self.build()?,
            func,
        })
    }
}

/// A function together with its memo
pub struct Memoized<F, T, C = JsonCodec> {
    memo: Memo<T, C>,
    func: F,
}

impl<F, T, C> std::fmt::Debug for Memoized<F, T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memoized")
            .field("memo", &self.memo)
            .finish_non_exhaustive()
    }
}

impl<F, T: Clone, C: BlobCodec<T>> Memoized<F, T, C> {
    /// The underlying memo
    #[must_use]
    pub fn memo(&self) -> &Memo<T, C> {
        &self.memo
    }

    /// Remove every cached result of the wrapped function
    pub fn clear(&self) -> Result<()> {
        self.memo.clear()
    }

    /// Call the wrapped function through the cache
    pub fn call(&self, args: &CallArgs) -> Result<T>
    where
        F: Fn(&BoundCall) -> T,
    {
        self.memo.call(args, |bound| (self.func)(bound))
    }

    /// Call the wrapped asynchronous function through the cache
    pub async fn call_async<Fut>(&self, args: &CallArgs) -> Result<T>
    where
        F: Fn(BoundCall) -> Fut,
        Fut: Future<Output = T>,
    {
        self.memo.call_async(args, |bound| (self.func)(bound)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn builder(tmp: &TempDir) -> MemoBuilder<i64> {
        Memo::builder(
            FunctionId::new("src/math.rs", "add"),
            Signature::new().param("a").param_with_default("b", 1),
        )
        .cache_dir(tmp.path())
        .context(MemoContext::new())
    }

    #[test]
    fn memory_hit_skips_function() {
        let tmp = TempDir::new().unwrap();
        let memo = builder(&tmp).store(StoreMode::Memory).build().unwrap();
        let calls = AtomicUsize::new(0);
        let add = |b: &BoundCall| {
            calls.fetch_add(1, Ordering::SeqCst);
            b.get::<i64>("a").unwrap() + b.get::<i64>("b").unwrap()
        };

        assert_eq!(memo.call(&CallArgs::new().arg(2), add).unwrap(), 3);
        assert_eq!(memo.call(&CallArgs::new().arg(2), add).unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Memory mode never touches the disk
        assert!(!memo.function_dir().exists());
    }

    #[test]
    fn errors_are_not_cached() {
        let tmp = TempDir::new().unwrap();
        let memo = builder(&tmp).build().unwrap();
        let args = CallArgs::new().arg(5);

        let failed: std::result::Result<i64, Error> =
            memo.try_call(&args, |_| Err(Error::configuration("boom")));
        assert!(failed.is_err());
        assert!(!memo.entry_path(&args).unwrap().exists());

        let value: std::result::Result<i64, Error> = memo.try_call(&args, |_| Ok(9));
        assert_eq!(value.unwrap(), 9);
        assert!(memo.entry_path(&args).unwrap().exists());
    }

    #[test]
    fn cache_file_override_ignores_arguments() {
        let tmp = TempDir::new().unwrap();
        let memo = builder(&tmp).cache_file("fixed.json").build().unwrap();
        let p1 = memo.entry_path(&CallArgs::new().arg(1)).unwrap();
        let p2 = memo.entry_path(&CallArgs::new().arg(2)).unwrap();
        assert_eq!(p1, p2);
        assert_eq!(p1, tmp.path().join("math/add/fixed.json"));
    }

    #[test]
    fn build_rejects_invalid_settings() {
        let tmp = TempDir::new().unwrap();
        let err = builder(&tmp).max_key_length(0).build().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }

    #[test]
    fn root_comes_from_context_when_not_overridden() {
        let tmp = TempDir::new().unwrap();
        let memo: Memo<i64> = Memo::builder(FunctionId::new("src/math.rs", "add"), Signature::new())
            .context(MemoContext::new().with_cache_dir(tmp.path()))
            .build()
            .unwrap();
        assert_eq!(memo.root(), tmp.path());
        assert_eq!(memo.function_dir(), tmp.path().join("math/add"));
    }
}
