//! Persistent memoization of function results
//!
//! memojar caches what a function returns, keyed by the arguments it was
//! called with, in process memory, on disk, or both. Disk entries survive
//! restarts and are shared between processes through advisory file locks.
//!
//! # Overview
//!
//! - [`Signature`] describes a function's parameters and binds a call's
//!   [`CallArgs`] to them, filling in defaults
//! - [`KeyComposer`] turns the bound call into a deterministic cache key
//! - [`paths`] maps the key to `<root>/<module>/<function>/[<shard>/]<key>.<ext>`
//! - [`MemoryStore`] and [`DiskStore`] hold results; [`BlobCodec`] decides how
//!   a result is written to disk
//! - [`Memo`] ties it together and [`Memoized`] pairs a memo with its function
//!
//! # Example
//!
//! ```no_run
//! use memojar::{BoundCall, CallArgs, Memo, Signature, function_id};
//!
//! let add = Memo::builder(
//!     function_id!(add),
//!     Signature::new().param("a").param_with_default("b", 1),
//! )
//! .wrap(|call: &BoundCall| call.get::<i64>("a").unwrap_or(0) + call.get::<i64>("b").unwrap_or(0))?;
//!
//! assert_eq!(add.call(&CallArgs::new().arg(2))?, 3);
//! // Answered from the cache
//! assert_eq!(add.call(&CallArgs::new().arg(2).kwarg("b", 1))?, 3);
//! # Ok::<(), memojar::Error>(())
//! ```

#![expect(
    clippy::missing_errors_doc,
    reason = "Every fallible function returns the crate Error; variants are documented there"
)]

pub mod codec;
pub mod config;
pub mod encode;
mod error;
pub mod key;
mod memo;
pub mod paths;
pub mod signature;
pub mod store;
pub mod value;

pub use error::{Error, Result};

pub use codec::{BlobCodec, CompressedCodec, JsonCodec};
pub use config::{
    CACHE_DIR_ENV, MemoContext, MemoSettings, StoreMode, default_cache_dir, set_default_cache_dir,
};
pub use encode::ArgEncoder;
pub use key::KeyComposer;
pub use memo::{Memo, MemoBuilder, Memoized};
pub use paths::FunctionId;
pub use signature::{BoundCall, CallArgs, ParamKind, Signature};
pub use store::{DiskStore, MemoryStore};
pub use value::{ArgValue, ArrayLike, FromArg};
