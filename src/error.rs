//! Error types for the file browser engine.

use std::io;
use std::path::{Path, PathBuf};

/// Coarse error category, matching the failure classes callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Target path (or an ancestor) does not exist.
    NotFound,
    /// Target path overlaps a path held by another in-flight operation.
    Busy,
    /// Path failed validation (not absolute, malformed).
    InvalidPath,
    /// Any other read/write/create/delete failure.
    Io,
}

/// Engine error type with contextual variants.
///
/// Every variant carries the path (and, where useful, the operation) that
/// failed. Errors never cross the operation boundary as `Err`: they are
/// rendered into the `error` field of an [`OpResult`](crate::OpResult).
///
/// # Examples
///
/// ```rust
/// use filebrowser_engine::{BrowseError, ErrorKind};
/// use std::path::PathBuf;
///
/// let err = BrowseError::Busy { path: PathBuf::from("/data/upload") };
/// assert_eq!(err.to_string(), "path busy: /data/upload");
/// assert_eq!(err.kind(), ErrorKind::Busy);
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum BrowseError {
    /// Path does not exist.
    #[error("not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Path (or an overlapping path) is held by another operation.
    #[error("path busy: {path}")]
    Busy {
        /// The path that is locked.
        path: PathBuf,
    },

    /// Path is not absolute or otherwise unusable.
    #[error("invalid path: {path:?} ({reason})")]
    InvalidPath {
        /// The path as supplied by the caller.
        path: String,
        /// Why the path was rejected.
        reason: &'static str,
    },

    /// Expected a directory but found something else.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// The path that is not a directory.
        path: PathBuf,
    },

    /// Expected a regular file but found something else.
    #[error("not a file: {path}")]
    NotAFile {
        /// The path that is not a file.
        path: PathBuf,
    },

    /// Path already exists when it shouldn't.
    #[error("{operation}: already exists: {path}")]
    AlreadyExists {
        /// The path that already exists.
        path: PathBuf,
        /// The operation that failed.
        operation: &'static str,
    },

    /// Permission denied for operation.
    #[error("{operation}: permission denied: {path}")]
    PermissionDenied {
        /// The path where permission was denied.
        path: PathBuf,
        /// The operation that was denied.
        operation: &'static str,
    },

    /// Engine configuration rejected.
    #[error("invalid config: {0}")]
    Config(String),

    /// The result sink refused a message.
    #[error("sink error: {0}")]
    Sink(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// I/O error with context.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The path involved in the operation.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl BrowseError {
    /// Build an error from an `io::Error`, keeping the path and operation.
    ///
    /// Common kinds map onto the dedicated variants so callers see
    /// "not found" rather than a raw OS message.
    pub fn io(operation: &'static str, path: &Path, error: io::Error) -> Self {
        let path = path.to_path_buf();
        match error.kind() {
            io::ErrorKind::NotFound => BrowseError::NotFound { path },
            io::ErrorKind::PermissionDenied => BrowseError::PermissionDenied { path, operation },
            io::ErrorKind::AlreadyExists => BrowseError::AlreadyExists { path, operation },
            _ => BrowseError::Io {
                operation,
                path,
                source: error,
            },
        }
    }

    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrowseError::NotFound { .. } => ErrorKind::NotFound,
            BrowseError::Busy { .. } => ErrorKind::Busy,
            BrowseError::InvalidPath { .. } => ErrorKind::InvalidPath,
            _ => ErrorKind::Io,
        }
    }
}

impl From<io::Error> for BrowseError {
    fn from(error: io::Error) -> Self {
        BrowseError::io("io", Path::new(""), error)
    }
}
