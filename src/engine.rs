//! The engine: shared state plus the entry points for every operation.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use tracing::{Span, debug, instrument, warn};

use crate::ops::{
    CopyTree, GetFile, List, MakeDirectory, Move, PutFile, Remove, Request, StreamOperation,
    StreamTask, SyncOperation,
};
use crate::{BrowseError, EngineConfig, OpBarrier, OpResult, PathLocks, SharedSink, UserToken};

/// One running file browser engine.
///
/// Owns the lock registry and the completion barrier. Clones share both, so
/// a clone can be handed to each connection while shutdown waits on the
/// original. Separate `Engine::new` calls are fully isolated.
///
/// # Example
///
/// ```rust
/// use filebrowser_engine::{CollectSink, Engine, SharedSink, UserToken};
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("notes.txt");
/// let path = path.to_str().unwrap();
/// let engine = Engine::default();
/// let user = UserToken::from("alice");
///
/// assert!(engine.put_file(&user, path, b"hello").is_ok());
/// assert!(engine.put_file(&user, path, &[]).is_ok());
///
/// let out = CollectSink::new();
/// let ack = engine.get_file(&user, path, &SharedSink::new(out.clone()));
/// assert!(ack.is_ok());
/// engine.wait_for_operations();
///
/// let messages = out.take();
/// assert_eq!(messages[0].chunk.as_ref().unwrap().bytes, b"hello");
/// assert!(messages[1].is_eof());
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    locks: PathLocks,
    barrier: OpBarrier,
    config: Arc<EngineConfig>,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            locks: PathLocks::new(),
            barrier: OpBarrier::new(),
            config: Arc::new(EngineConfig::default()),
        }
    }
}

impl Engine {
    /// Create an engine with its own registry and barrier.
    ///
    /// # Errors
    ///
    /// - [`BrowseError::Config`] if the configuration is unusable
    pub fn new(config: EngineConfig) -> Result<Self, BrowseError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            ..Self::default()
        })
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The lock registry.
    pub fn locks(&self) -> &PathLocks {
        &self.locks
    }

    /// The completion barrier.
    pub fn barrier(&self) -> &OpBarrier {
        &self.barrier
    }

    /// Block until every background operation has finished.
    pub fn wait_for_operations(&self) {
        self.barrier.wait_all();
    }

    /// Run a synchronous operation.
    pub fn execute<O: SyncOperation>(&self, user: &UserToken, op: &O) -> OpResult {
        op.execute(self, user)
    }

    /// Start a streaming operation.
    ///
    /// Returns the acknowledgment: success once the background unit is
    /// running, or the pre-flight failure, which is also emitted to `sink`
    /// as the single message of the stream.
    pub fn spawn<O: StreamOperation>(&self, user: &UserToken, op: &O, sink: &SharedSink) -> OpResult {
        let task = match op.prepare(self, user) {
            Ok(task) => task,
            Err(err) => return reject(O::NAME, &err, sink),
        };

        match self.run_in_background(O::NAME, task, sink) {
            Ok(()) => OpResult::ok(),
            Err(err) => reject(O::NAME, &err, sink),
        }
    }

    fn run_in_background<T: StreamTask>(
        &self,
        operation: &'static str,
        task: T,
        sink: &SharedSink,
    ) -> Result<(), BrowseError> {
        let ticket = self.barrier.begin();
        let span = Span::current();
        let sink = sink.clone();
        thread::Builder::new()
            .name(format!("fb-{operation}"))
            .spawn(move || {
                let _entered = span.enter();
                let _ticket = ticket;
                debug!(operation, "background operation started");
                match task.run(&sink) {
                    Ok(()) => debug!(operation, "background operation finished"),
                    Err(err @ BrowseError::Sink(_)) => {
                        warn!(operation, error = %err, "sink failed, stream abandoned");
                    }
                    Err(err) => {
                        warn!(operation, error = %err, "background operation failed");
                        if let Err(sink_err) = sink.emit(&OpResult::failure(&err)) {
                            warn!(error = %sink_err, "could not report failure");
                        }
                    }
                }
            })
            .map(drop)
            .map_err(|e| BrowseError::io("spawn", Path::new(""), e))
    }

    /// List the direct children of `path`.
    pub fn list(&self, user: &UserToken, path: &str) -> OpResult {
        self.execute(user, &List { path })
    }

    /// Create `path` and its missing parents.
    pub fn make_directory(&self, user: &UserToken, path: &str) -> OpResult {
        self.execute(user, &MakeDirectory { path })
    }

    /// Remove a file or directory tree.
    pub fn remove(&self, user: &UserToken, path: &str) -> OpResult {
        self.execute(user, &Remove { path })
    }

    /// Append `bytes` to `path`; empty `bytes` ends the upload.
    pub fn put_file(&self, user: &UserToken, path: &str, bytes: &[u8]) -> OpResult {
        self.execute(user, &PutFile { path, bytes })
    }

    /// Rename `src` to `dst`.
    pub fn move_path(&self, user: &UserToken, src: &str, dst: &str) -> OpResult {
        self.execute(user, &Move { src, dst })
    }

    /// Copy `src` into the directory `dst` in the background.
    #[instrument(level = "debug", skip_all, fields(user = %user, src = src, dst = dst))]
    pub fn copy(&self, user: &UserToken, src: &str, dst: &str, sink: &SharedSink) -> OpResult {
        self.spawn(user, &CopyTree { src, dst }, sink)
    }

    /// Stream the file at `path` into `sink` in the background.
    #[instrument(level = "debug", skip_all, fields(user = %user, path = path))]
    pub fn get_file(&self, user: &UserToken, path: &str, sink: &SharedSink) -> OpResult {
        self.spawn(user, &GetFile { path }, sink)
    }

    /// Run any decoded request.
    ///
    /// Streaming requests write to `sink`; synchronous ones ignore it.
    pub fn dispatch(&self, user: &UserToken, request: &Request, sink: &SharedSink) -> OpResult {
        match request {
            Request::List { path } => self.list(user, path),
            Request::MakeDirectory { path } => self.make_directory(user, path),
            Request::Remove { path } => self.remove(user, path),
            Request::PutFile { path, bytes } => self.put_file(user, path, bytes),
            Request::Move { src, dst } => self.move_path(user, src, dst),
            Request::Copy { src, dst } => self.copy(user, src, dst, sink),
            Request::GetFile { path } => self.get_file(user, path, sink),
        }
    }
}

/// Report a streaming operation that never started.
fn reject(operation: &'static str, err: &BrowseError, sink: &SharedSink) -> OpResult {
    warn!(operation, error = %err, "operation rejected");
    let result = OpResult::failure(err);
    if let Err(sink_err) = sink.emit(&result) {
        warn!(error = %sink_err, "could not report rejection");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CollectSink;

    #[test]
    fn engines_are_isolated() {
        let a = Engine::default();
        let b = Engine::default();
        a.locks().lock(Path::new("/shared"));
        assert!(a.locks().is_locked(Path::new("/shared/x")));
        assert!(!b.locks().is_locked(Path::new("/shared/x")));
    }

    #[test]
    fn clones_share_state() {
        let a = Engine::default();
        let b = a.clone();
        let ticket = a.barrier().begin();
        assert_eq!(b.barrier().outstanding(), 1);
        drop(ticket);
        b.wait_for_operations();
    }

    #[test]
    fn new_rejects_bad_config() {
        let err = Engine::new(EngineConfig::default().with_chunk_size(0)).unwrap_err();
        assert!(matches!(err, BrowseError::Config(_)));
    }

    #[test]
    fn rejected_stream_reports_once_on_ack_and_sink() {
        let engine = Engine::default();
        let out = CollectSink::new();
        let ack = engine.get_file(
            &UserToken::from("t"),
            "/this/is/not/a/valid/path",
            &SharedSink::new(out.clone()),
        );
        engine.wait_for_operations();
        assert!(ack.is_failure());
        assert_eq!(out.take(), vec![ack]);
        assert_eq!(engine.barrier().outstanding(), 0);
    }

    #[test]
    fn dispatch_routes_sync_requests() {
        let engine = Engine::default();
        let res = engine.dispatch(
            &UserToken::from("t"),
            &Request::List {
                path: "relative".into(),
            },
            &SharedSink::new(crate::DiscardSink),
        );
        assert!(res.error.starts_with("invalid path"));
    }
}
