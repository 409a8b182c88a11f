//! # Operations
//!
//! Every engine operation belongs to one of two categories.
//!
//! ## Categories
//!
//! | Trait | Shape | Operations |
//! |-------|-------|------------|
//! | [`SyncOperation`] | runs on the caller's thread, returns one [`OpResult`] | [`List`], [`MakeDirectory`], [`Remove`], [`PutFile`], [`Move`] |
//! | [`StreamOperation`] | pre-flight inline, then streams into a [`SharedSink`] from a background unit registered with the barrier | [`CopyTree`], [`GetFile`] |
//!
//! A streaming operation is split in two:
//!
//! ```text
//! prepare()  caller thread   validate paths, take locks, open sources
//!     │                      failure → ack error + one error message on the sink
//!     ▼
//! run()      background      stream messages; Err → one terminal error message
//! ```
//!
//! [`Request`] names every operation so a transport can hand the engine a
//! decoded request without matching on operation names itself.

mod dir;
mod transfer;

pub use dir::{List, MakeDirectory, Move, PutFile, Remove};
pub use transfer::{CopyTree, CopyTreeTask, GetFile, GetFileTask, chunk_count};

use crate::{BrowseError, Engine, OpResult, SharedSink, UserToken};

/// An operation that completes inline and returns a single result.
pub trait SyncOperation {
    /// Run the operation. Failures are reported through `OpResult::error`.
    fn execute(&self, engine: &Engine, user: &UserToken) -> OpResult;
}

/// An operation whose work happens on a background unit.
pub trait StreamOperation {
    /// The background half, produced by a successful pre-flight.
    type Task: StreamTask;

    /// Short name used for thread names and logs.
    const NAME: &'static str;

    /// Validate inputs and acquire everything the background half needs.
    ///
    /// # Errors
    ///
    /// Any failure that makes the operation impossible to start: invalid
    /// paths, missing sources, busy paths.
    fn prepare(&self, engine: &Engine, user: &UserToken) -> Result<Self::Task, BrowseError>;
}

/// The background half of a [`StreamOperation`].
pub trait StreamTask: Send + 'static {
    /// Stream progress and success messages into `sink`.
    ///
    /// Returning `Err` ends the stream; the engine emits the error as the
    /// terminal message unless the sink itself failed.
    fn run(self, sink: &SharedSink) -> Result<(), BrowseError>;
}

/// A decoded request for any operation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "op", rename_all = "snake_case"))]
pub enum Request {
    /// List a directory.
    List {
        /// Directory to list.
        path: String,
    },
    /// Create a directory and its missing parents.
    MakeDirectory {
        /// Directory to create.
        path: String,
    },
    /// Remove a file or directory tree.
    Remove {
        /// Path to remove.
        path: String,
    },
    /// Append one chunk to a file; empty `bytes` ends the upload.
    PutFile {
        /// File to append to.
        path: String,
        /// Chunk content.
        #[cfg_attr(feature = "serde", serde(default))]
        bytes: Vec<u8>,
    },
    /// Rename a path.
    Move {
        /// Existing path.
        src: String,
        /// New path.
        dst: String,
    },
    /// Copy a tree into a directory (background).
    Copy {
        /// File or directory to copy.
        src: String,
        /// Existing directory receiving the copy.
        dst: String,
    },
    /// Stream a file in chunks (background).
    GetFile {
        /// File to read.
        path: String,
    },
}

impl Request {
    /// `true` for operations that stream into a sink.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Request::Copy { .. } | Request::GetFile { .. })
    }

    /// Operation name as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Request::List { .. } => "list",
            Request::MakeDirectory { .. } => "make_directory",
            Request::Remove { .. } => "remove",
            Request::PutFile { .. } => "put_file",
            Request::Move { .. } => "move",
            Request::Copy { .. } => CopyTree::NAME,
            Request::GetFile { .. } => GetFile::NAME,
        }
    }
}
