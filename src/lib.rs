//! # filebrowser-engine
//!
//! Operation engine behind a remote file browser: it lists directories,
//! creates and removes paths, and moves file content in and out of the local
//! filesystem on behalf of a caller identified by a user token.
//!
//! The transport (listener, RPC dispatch, wire encoding) is **not** part of
//! this crate. It hands the engine a [`Request`] or calls the engine methods
//! directly, and receives [`OpResult`] messages back, either as a return
//! value or through a [`ResultSink`].
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust
//! use filebrowser_engine::{CollectSink, Engine, SharedSink, UserToken};
//!
//! let home = tempfile::tempdir().unwrap();
//! let root = home.path().to_str().unwrap();
//! let engine = Engine::default();
//! let user = UserToken::from("alice");
//!
//! // Synchronous operations return one result.
//! let docs = format!("{root}/docs/2024");
//! assert!(engine.make_directory(&user, &docs).is_ok());
//! let listing = engine.list(&user, &format!("{root}/docs"));
//! assert_eq!(listing.entries.len(), 1);
//!
//! // Streaming operations acknowledge, then report through the sink.
//! let backup = format!("{root}/backup");
//! assert!(engine.make_directory(&user, &backup).is_ok());
//! let out = CollectSink::new();
//! let ack = engine.copy(&user, &format!("{root}/docs"), &backup, &SharedSink::new(out.clone()));
//! assert!(ack.is_ok());
//!
//! engine.wait_for_operations();
//! assert!(out.take()[0].is_ok());
//! assert!(home.path().join("backup/docs/2024").is_dir());
//! ```
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Engine`] | Entry point; owns the lock registry and the barrier |
//! | [`OpResult`] | The one message type: `error`, `entries` or `chunk` |
//! | [`PathLocks`] | Busy-path registry with ancestor containment |
//! | [`OpBarrier`] | Counts background operations; `wait_all` drains them |
//! | [`SharedSink`] | Serializes messages from concurrent operations onto one sink |
//! | [`BrowseError`] | Contextual error, rendered into `OpResult::error` |
//!
//! ---
//!
//! ## Operations
//!
//! | Operation | Shape | Result |
//! |-----------|-------|--------|
//! | `list` | sync | `entries` of the direct children |
//! | `make_directory` | sync | creates missing parents, idempotent |
//! | `remove` | sync | recursive |
//! | `put_file` | sync | appends one chunk; empty chunk ends the upload |
//! | `move_path` | sync | rename, never overwrites |
//! | `copy` | streaming | one terminal message |
//! | `get_file` | streaming | chunks `1..=total`, then `error = "EOF"` |
//!
//! Streaming operations register with the engine's [`OpBarrier`] before they
//! start; call [`Engine::wait_for_operations`] before relying on their side
//! effects or shutting down.
//!
//! ---
//!
//! ## Error Handling
//!
//! Nothing is thrown across the operation boundary. Every failure becomes an
//! [`OpResult`] whose `error` is the [`BrowseError`] display text:
//!
//! ```rust
//! use filebrowser_engine::{Engine, UserToken};
//!
//! let engine = Engine::default();
//! let res = engine.list(&UserToken::from("bob"), "does/not/exist");
//! assert_eq!(res.error, r#"invalid path: "does/not/exist" (not absolute)"#);
//! assert!(res.entries.is_empty());
//! ```
//!
//! ---
//!
//! ## Concurrency
//!
//! Mutating operations acquire their path in the [`PathLocks`] registry and
//! fail fast with "path busy" when it overlaps a path held by another
//! operation. Locks are scoped guards, released on every exit path.
//!
//! ---
//!
//! ## Logging
//!
//! Operations emit [`tracing`] spans and events (`debug` for progress, `warn`
//! for failures). The crate never installs a subscriber.
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` (default) | Serialization for [`OpResult`], [`Request`], [`EngineConfig`]; `JsonLinesSink` |

// Private modules
mod barrier;
mod config;
mod engine;
mod error;
mod lock;
mod sink;
mod types;

// Public modules
pub mod ops;
pub mod path;

// Public re-exports - errors
pub use error::{BrowseError, ErrorKind};

// Public re-exports - core types
pub use types::{Chunk, EOF_SENTINEL, Entry, FileType, OpResult, Permissions, UserToken};

// Public re-exports - engine and configuration
pub use config::{CHUNK_SIZE, EngineConfig};
pub use engine::Engine;

// Public re-exports - concurrency
pub use barrier::{OpBarrier, OpTicket};
pub use lock::{PathGuard, PathLocks};

// Public re-exports - sinks
pub use sink::{ChannelSink, CollectSink, DiscardSink, ResultSink, SharedSink};

// Public re-exports - operations
pub use ops::{
    CopyTree, GetFile, List, MakeDirectory, Move, PutFile, Remove, Request, StreamOperation,
    StreamTask, SyncOperation,
};

// Conditional re-exports
#[cfg(feature = "serde")]
pub use sink::JsonLinesSink;
