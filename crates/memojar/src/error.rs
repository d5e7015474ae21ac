//! Error types for the memojar crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for memoization operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error while reading or writing the disk cache
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(memojar::io),
        help("Check file permissions and ensure the cache directory is writable")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "create_dir_all")
        operation: String,
    },

    /// Invalid memoization settings
    #[error("Invalid memoization configuration: {message}")]
    #[diagnostic(code(memojar::config))]
    InvalidConfiguration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// The same parameter was supplied both positionally and by name
    #[error("{function}: arguments supplied both positionally and by name: {}", names.join(", "))]
    #[diagnostic(
        code(memojar::overlapping_arguments),
        help("Pass each parameter either positionally or by name, not both")
    )]
    OverlappingArguments {
        /// Name of the wrapped function
        function: String,
        /// Parameter names that were bound twice
        names: Vec<String>,
    },

    /// A parameter was read from a bound call but never supplied
    #[error("Missing argument: {name}")]
    #[diagnostic(code(memojar::missing_argument))]
    MissingArgument {
        /// Parameter name
        name: String,
    },

    /// A bound argument could not be converted to the requested type
    #[error("Argument {name} has type {found}, expected {expected}")]
    #[diagnostic(code(memojar::argument_type))]
    ArgumentType {
        /// Parameter name
        name: String,
        /// Requested type
        expected: &'static str,
        /// Kind of the stored value
        found: &'static str,
    },

    /// A cached blob could not be decoded
    #[error("Corrupt cache blob: {message}")]
    #[diagnostic(
        code(memojar::corrupt_blob),
        help("The entry is recomputed and rewritten on the next call")
    )]
    CorruptBlob {
        /// Error message from the codec
        message: String,
    },

    /// A value could not be encoded into a blob
    #[error("Serialization error: {message}")]
    #[diagnostic(code(memojar::serialization))]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },

    /// An advisory lock could not be acquired in time
    #[error("Timed out after {waited:?} waiting for lock {}", path.display())]
    #[diagnostic(
        code(memojar::lock_timeout),
        help("Another process may be holding the lock; remove stale .lock files if none is running")
    )]
    LockTimeout {
        /// Lock file path
        path: Box<Path>,
        /// How long acquisition was attempted
        waited: Duration,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an overlapping arguments error
    #[must_use]
    pub fn overlapping(function: impl Into<String>, names: Vec<String>) -> Self {
        Self::OverlappingArguments {
            function: function.into(),
            names,
        }
    }

    /// Create a missing argument error
    #[must_use]
    pub fn missing_argument(name: impl Into<String>) -> Self {
        Self::MissingArgument { name: name.into() }
    }

    /// Create a corrupt blob error
    #[must_use]
    pub fn corrupt_blob(msg: impl Into<String>) -> Self {
        Self::CorruptBlob {
            message: msg.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create a lock timeout error
    #[must_use]
    pub fn lock_timeout(path: impl AsRef<Path>, waited: Duration) -> Self {
        Self::LockTimeout {
            path: path.as_ref().into(),
            waited,
        }
    }
}

/// Result type for memoization operations
pub type Result<T> = std::result::Result<T, Error>;
