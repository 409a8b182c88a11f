//! Background transfers: recursive copy and chunked file reads.
//!
//! Both operations follow the same protocol:
//!
//! 1. `prepare` runs on the caller's thread: paths are validated, locks are
//!    taken and the source is opened, so every "cannot start" failure is
//!    reported synchronously.
//! 2. The returned task moves to a background unit holding its locks and
//!    streams messages into the caller's sink.
//!
//! # Chunk stream
//!
//! ```text
//! chunk 1/n ─▶ chunk 2/n ─▶ … ─▶ chunk n/n ─▶ error = "EOF"
//! ```
//!
//! An empty file produces only the `EOF` message. A read failure replaces the
//! sentinel with a real error and nothing follows it.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::WalkDir;

use super::dir::exists;
use super::{StreamOperation, StreamTask};
use crate::types::entry_name;
use crate::{BrowseError, Engine, OpResult, PathGuard, SharedSink, UserToken, path};

/// Number of chunks a file of `size` bytes is split into.
///
/// Zero for an empty file.
///
/// # Example
///
/// ```rust
/// use filebrowser_engine::ops::chunk_count;
///
/// assert_eq!(chunk_count(0, 1024), 0);
/// assert_eq!(chunk_count(1024, 1024), 1);
/// assert_eq!(chunk_count(1025, 1024), 2);
/// ```
pub fn chunk_count(size: u64, chunk_size: usize) -> u64 {
    size.div_ceil(chunk_size as u64)
}

/// Copy a file or directory tree into an existing directory.
///
/// The copy lands at `dst/<name of src>`. The whole destination tree stays
/// locked until the copy ends. The source is refused if it or anything inside
/// it is held by another operation. Directories, regular files and symlinks
/// are copied; any other entry (FIFO, socket, device) aborts the copy with
/// [`BrowseError::NotAFile`]. The first failure aborts the copy; whatever was
/// already copied is left in place.
#[derive(Debug, Clone, Copy)]
pub struct CopyTree<'a> {
    /// File or directory to copy.
    pub src: &'a str,
    /// Existing directory receiving the copy.
    pub dst: &'a str,
}

impl StreamOperation for CopyTree<'_> {
    type Task = CopyTreeTask;
    const NAME: &'static str = "copy";

    fn prepare(&self, engine: &Engine, _user: &UserToken) -> Result<CopyTreeTask, BrowseError> {
        let src = path::validate(self.src)?;
        let dst = path::validate(self.dst)?;

        fs::symlink_metadata(&src).map_err(|e| BrowseError::io("stat", &src, e))?;
        let dst_meta = fs::metadata(&dst).map_err(|e| BrowseError::io("stat", &dst, e))?;
        if !dst_meta.is_dir() {
            return Err(BrowseError::NotADirectory { path: dst });
        }
        if src.parent().is_none() {
            return Err(BrowseError::InvalidPath {
                path: self.src.to_string(),
                reason: "cannot copy the root",
            });
        }

        let target = dst.join(entry_name(&src));
        if target.starts_with(&src) {
            return Err(BrowseError::InvalidPath {
                path: self.dst.to_string(),
                reason: "destination inside source",
            });
        }
        if engine.locks().conflicts(&src) {
            return Err(BrowseError::Busy { path: src });
        }
        let guard = engine.locks().try_acquire(&target)?;
        if exists(&target) {
            return Err(BrowseError::AlreadyExists {
                path: target,
                operation: "copy",
            });
        }

        Ok(CopyTreeTask {
            src,
            target,
            follow_symlinks: engine.config().follow_symlinks,
            _guard: guard,
        })
    }
}

/// Background half of [`CopyTree`].
#[derive(Debug)]
pub struct CopyTreeTask {
    src: PathBuf,
    target: PathBuf,
    follow_symlinks: bool,
    _guard: PathGuard,
}

impl CopyTreeTask {
    fn copy_entry(&self, entry: &walkdir::DirEntry) -> Result<(), BrowseError> {
        let from = entry.path();
        let rel = from.strip_prefix(&self.src).map_err(|_| BrowseError::InvalidPath {
            path: from.display().to_string(),
            reason: "outside copy source",
        })?;
        let to = if rel.as_os_str().is_empty() {
            self.target.clone()
        } else {
            self.target.join(rel)
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir(&to).map_err(|e| BrowseError::io("create_dir", &to, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(from, &to)?;
        } else if file_type.is_file() {
            fs::copy(from, &to).map_err(|e| BrowseError::io("copy", from, e))?;
        } else {
            return Err(BrowseError::NotAFile {
                path: from.to_path_buf(),
            });
        }
        trace!(from = %from.display(), to = %to.display(), "copied entry");
        Ok(())
    }
}

impl StreamTask for CopyTreeTask {
    fn run(self, sink: &SharedSink) -> Result<(), BrowseError> {
        let mut copied = 0usize;
        for entry in WalkDir::new(&self.src).follow_links(self.follow_symlinks) {
            let entry = entry.map_err(walk_error)?;
            self.copy_entry(&entry)?;
            copied += 1;
        }
        debug!(entries = copied, target = %self.target.display(), "copy finished");
        sink.emit(&OpResult::ok())
    }
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<(), BrowseError> {
    let link = fs::read_link(from).map_err(|e| BrowseError::io("read_link", from, e))?;
    std::os::unix::fs::symlink(&link, to).map_err(|e| BrowseError::io("symlink", to, e))
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<(), BrowseError> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| BrowseError::io("copy", from, e))
}

fn walk_error(err: walkdir::Error) -> BrowseError {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    match err.into_io_error() {
        Some(source) => BrowseError::io("walk", &path, source),
        None => BrowseError::Io {
            operation: "walk",
            path,
            source: io::Error::other("symlink loop"),
        },
    }
}

/// Stream a file to the sink in numbered chunks, ending with the `EOF`
/// sentinel.
#[derive(Debug, Clone, Copy)]
pub struct GetFile<'a> {
    /// File to read.
    pub path: &'a str,
}

impl StreamOperation for GetFile<'_> {
    type Task = GetFileTask;
    const NAME: &'static str = "get_file";

    fn prepare(&self, engine: &Engine, _user: &UserToken) -> Result<GetFileTask, BrowseError> {
        let file_path = path::validate(self.path)?;
        if engine.locks().is_locked(&file_path) {
            return Err(BrowseError::Busy { path: file_path });
        }
        // opening a FIFO blocks until a writer shows up
        let meta = fs::metadata(&file_path).map_err(|e| BrowseError::io("stat", &file_path, e))?;
        if !meta.is_file() {
            return Err(BrowseError::NotAFile { path: file_path });
        }
        let file = File::open(&file_path).map_err(|e| BrowseError::io("open", &file_path, e))?;
        let meta = file
            .metadata()
            .map_err(|e| BrowseError::io("stat", &file_path, e))?;

        let chunk_size = engine.config().chunk_size;
        Ok(GetFileTask {
            path: file_path,
            file,
            size: meta.len(),
            total: chunk_count(meta.len(), chunk_size),
            chunk_size,
        })
    }
}

/// Background half of [`GetFile`].
#[derive(Debug)]
pub struct GetFileTask {
    path: PathBuf,
    file: File,
    size: u64,
    total: u64,
    chunk_size: usize,
}

impl StreamTask for GetFileTask {
    fn run(mut self, sink: &SharedSink) -> Result<(), BrowseError> {
        let step = self.chunk_size as u64;
        for index in 1..=self.total {
            let remaining = self.size - (index - 1) * step;
            // both bounded by chunk_size, so the cast is lossless
            let len = remaining.min(step) as usize;
            let mut bytes = vec![0u8; len];
            self.file
                .read_exact(&mut bytes)
                .map_err(|e| BrowseError::io("read", &self.path, e))?;
            trace!(index, total = self.total, len, "chunk");
            sink.emit(&OpResult::chunk(index, self.total, bytes))?;
        }
        debug!(size = self.size, chunks = self.total, "file streamed");
        sink.emit(&OpResult::eof())
    }
}
