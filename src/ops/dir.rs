//! Synchronous directory and file operations.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::{debug, instrument, warn};

use super::SyncOperation;
use crate::types::entry_name;
use crate::{BrowseError, Engine, Entry, OpResult, UserToken, path};

/// Log a failed operation and turn the outcome into a result message.
fn finish(operation: &'static str, outcome: Result<OpResult, BrowseError>) -> OpResult {
    if let Err(err) = &outcome {
        warn!(operation, error = %err, "operation failed");
    }
    outcome.into()
}

/// List the direct children of a directory.
#[derive(Debug, Clone, Copy)]
pub struct List<'a> {
    /// Directory to list.
    pub path: &'a str,
}

impl List<'_> {
    fn entries(&self) -> Result<Vec<Entry>, BrowseError> {
        let dir = path::validate(self.path)?;
        let meta = fs::metadata(&dir).map_err(|e| BrowseError::io("stat", &dir, e))?;
        if !meta.is_dir() {
            return Err(BrowseError::NotADirectory { path: dir });
        }

        let mut entries = Vec::new();
        for child in fs::read_dir(&dir).map_err(|e| BrowseError::io("read_dir", &dir, e))? {
            let child = child.map_err(|e| BrowseError::io("read_dir", &dir, e))?;
            let child_path = child.path();
            let meta = child
                .metadata()
                .map_err(|e| BrowseError::io("stat", &child_path, e))?;
            entries.push(Entry::from_metadata(entry_name(&child_path), &meta));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

impl SyncOperation for List<'_> {
    #[instrument(level = "debug", skip_all, fields(user = %user, path = self.path))]
    fn execute(&self, _engine: &Engine, user: &UserToken) -> OpResult {
        finish(
            "list",
            self.entries().map(|entries| {
                debug!(count = entries.len(), "listed directory");
                OpResult::listing(entries)
            }),
        )
    }
}

/// Create a directory along with any missing parents.
///
/// Succeeds if the directory already exists.
#[derive(Debug, Clone, Copy)]
pub struct MakeDirectory<'a> {
    /// Directory to create.
    pub path: &'a str,
}

impl MakeDirectory<'_> {
    fn run(&self, engine: &Engine) -> Result<OpResult, BrowseError> {
        let dir = path::validate(self.path)?;
        let _guard = engine.locks().try_acquire(&dir)?;
        fs::create_dir_all(&dir).map_err(|e| BrowseError::io("create_dir", &dir, e))?;
        debug!("directory ready");
        Ok(OpResult::ok())
    }
}

impl SyncOperation for MakeDirectory<'_> {
    #[instrument(level = "debug", skip_all, fields(user = %user, path = self.path))]
    fn execute(&self, engine: &Engine, user: &UserToken) -> OpResult {
        finish("make_directory", self.run(engine))
    }
}

/// Delete a file, symlink, or whole directory tree.
#[derive(Debug, Clone, Copy)]
pub struct Remove<'a> {
    /// Path to remove.
    pub path: &'a str,
}

impl Remove<'_> {
    fn run(&self, engine: &Engine) -> Result<OpResult, BrowseError> {
        let target = path::validate(self.path)?;
        if target.parent().is_none() {
            return Err(BrowseError::InvalidPath {
                path: self.path.to_string(),
                reason: "refusing to remove the root",
            });
        }
        let _guard = engine.locks().try_acquire(&target)?;
        let meta = fs::symlink_metadata(&target).map_err(|e| BrowseError::io("stat", &target, e))?;
        let removed = if meta.is_dir() {
            fs::remove_dir_all(&target)
        } else {
            fs::remove_file(&target)
        };
        removed.map_err(|e| BrowseError::io("remove", &target, e))?;
        debug!(dir = meta.is_dir(), "removed");
        Ok(OpResult::ok())
    }
}

impl SyncOperation for Remove<'_> {
    #[instrument(level = "debug", skip_all, fields(user = %user, path = self.path))]
    fn execute(&self, engine: &Engine, user: &UserToken) -> OpResult {
        finish("remove", self.run(engine))
    }
}

/// Append one chunk of an upload to a file.
///
/// The first call creates the file; its parent directory must exist. An empty
/// `bytes` marks the end of the upload and leaves the content untouched.
#[derive(Debug, Clone, Copy)]
pub struct PutFile<'a> {
    /// File to append to.
    pub path: &'a str,
    /// Chunk content.
    pub bytes: &'a [u8],
}

impl PutFile<'_> {
    fn run(&self, engine: &Engine) -> Result<OpResult, BrowseError> {
        let file_path = path::validate(self.path)?;
        let _guard = engine.locks().try_acquire(&file_path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .map_err(|e| BrowseError::io("open", &file_path, e))?;
        if self.bytes.is_empty() {
            debug!("upload complete");
            return Ok(OpResult::ok());
        }
        file.write_all(self.bytes)
            .map_err(|e| BrowseError::io("write", &file_path, e))?;
        if engine.config().sync_writes {
            file.sync_data()
                .map_err(|e| BrowseError::io("sync", &file_path, e))?;
        }
        Ok(OpResult::ok())
    }
}

impl SyncOperation for PutFile<'_> {
    #[instrument(level = "debug", skip_all, fields(user = %user, path = self.path, len = self.bytes.len()))]
    fn execute(&self, engine: &Engine, user: &UserToken) -> OpResult {
        finish("put_file", self.run(engine))
    }
}

/// Rename a file or directory.
///
/// Refuses to overwrite an existing destination.
#[derive(Debug, Clone, Copy)]
pub struct Move<'a> {
    /// Existing path.
    pub src: &'a str,
    /// New path; its parent must exist.
    pub dst: &'a str,
}

impl Move<'_> {
    fn run(&self, engine: &Engine) -> Result<OpResult, BrowseError> {
        let src = path::validate(self.src)?;
        let dst = path::validate(self.dst)?;
        if dst.starts_with(&src) {
            return Err(BrowseError::InvalidPath {
                path: self.dst.to_string(),
                reason: "destination inside source",
            });
        }
        let _guard = engine
            .locks()
            .try_acquire_all(&[src.as_path(), dst.as_path()])?;
        fs::symlink_metadata(&src).map_err(|e| BrowseError::io("stat", &src, e))?;
        if let Some(parent) = dst.parent() {
            let meta = fs::metadata(parent).map_err(|e| BrowseError::io("stat", parent, e))?;
            if !meta.is_dir() {
                return Err(BrowseError::NotADirectory {
                    path: parent.to_path_buf(),
                });
            }
        }
        if exists(&dst) {
            return Err(BrowseError::AlreadyExists {
                path: dst,
                operation: "move",
            });
        }
        fs::rename(&src, &dst).map_err(|e| BrowseError::io("rename", &src, e))?;
        debug!("moved");
        Ok(OpResult::ok())
    }
}

impl SyncOperation for Move<'_> {
    #[instrument(level = "debug", skip_all, fields(user = %user, src = self.src, dst = self.dst))]
    fn execute(&self, engine: &Engine, user: &UserToken) -> OpResult {
        finish("move", self.run(engine))
    }
}

/// `true` if anything, including a dangling symlink, lives at `path`.
pub(crate) fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileType;
    use tempfile::TempDir;

    fn setup() -> (Engine, UserToken, TempDir) {
        (Engine::default(), UserToken::from("test"), TempDir::new().unwrap())
    }

    fn s(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    #[test]
    fn list_reports_children_sorted() {
        let (engine, user, tmp) = setup();
        fs::create_dir(tmp.path().join("b")).unwrap();
        fs::write(tmp.path().join("a.txt"), b"12345").unwrap();

        let res = List { path: s(tmp.path()) }.execute(&engine, &user);
        assert!(res.is_ok(), "{}", res.error);
        let names: Vec<_> = res.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b"]);
        assert_eq!(res.entries[0].size, 5);
        assert_eq!(res.entries[1].file_type, FileType::Directory);
    }

    #[test]
    fn list_empty_directory() {
        let (engine, user, tmp) = setup();
        let res = List { path: s(tmp.path()) }.execute(&engine, &user);
        assert_eq!(res.error, "");
        assert!(res.entries.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn list_reports_symlink_without_following() {
        let (engine, user, tmp) = setup();
        fs::create_dir(tmp.path().join("target")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("target"), tmp.path().join("link")).unwrap();

        let res = List { path: s(tmp.path()) }.execute(&engine, &user);
        assert!(res.is_ok(), "{}", res.error);
        let link = res.entries.iter().find(|e| e.name == "link").unwrap();
        assert_eq!(link.file_type, FileType::Symlink);
        assert!(!link.is_dir());
    }

    #[test]
    fn list_on_file_is_not_a_directory() {
        let (engine, user, tmp) = setup();
        let file = tmp.path().join("f");
        fs::write(&file, b"").unwrap();
        let res = List { path: s(&file) }.execute(&engine, &user);
        assert!(res.error.starts_with("not a directory"));
        assert!(res.entries.is_empty());
    }

    #[test]
    fn make_directory_is_idempotent() {
        let (engine, user, tmp) = setup();
        let dir = tmp.path().join("x/y");
        let op = MakeDirectory { path: s(&dir) };
        assert!(op.execute(&engine, &user).is_ok());
        assert!(op.execute(&engine, &user).is_ok());
        assert!(dir.is_dir());
    }

    #[test]
    fn make_directory_over_file_fails() {
        let (engine, user, tmp) = setup();
        let file = tmp.path().join("f");
        fs::write(&file, b"").unwrap();
        let res = MakeDirectory { path: s(&file) }.execute(&engine, &user);
        assert!(res.is_failure());
    }

    #[test]
    fn busy_path_is_refused_and_untouched() {
        let (engine, user, tmp) = setup();
        let dir = tmp.path().join("held");
        let _guard = engine.locks().try_acquire(tmp.path()).unwrap();
        let res = MakeDirectory { path: s(&dir) }.execute(&engine, &user);
        assert!(res.error.starts_with("path busy"), "{}", res.error);
        assert!(!dir.exists());
    }

    #[test]
    fn remove_tree_and_file() {
        let (engine, user, tmp) = setup();
        let dir = tmp.path().join("d/e");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("f"), b"x").unwrap();
        let file = tmp.path().join("g");
        fs::write(&file, b"x").unwrap();

        assert!(Remove { path: s(&tmp.path().join("d")) }.execute(&engine, &user).is_ok());
        assert!(Remove { path: s(&file) }.execute(&engine, &user).is_ok());
        assert!(!tmp.path().join("d").exists());
        assert!(!file.exists());
    }

    #[test]
    fn remove_missing_is_not_found() {
        let (engine, user, tmp) = setup();
        let res = Remove { path: s(&tmp.path().join("nope")) }.execute(&engine, &user);
        assert!(res.error.starts_with("not found"), "{}", res.error);
    }

    #[test]
    fn remove_root_is_refused() {
        let (engine, user, _tmp) = setup();
        let res = Remove { path: "/" }.execute(&engine, &user);
        assert!(res.error.contains("refusing to remove the root"));
    }

    #[test]
    fn remove_releases_lock_on_failure() {
        let (engine, user, tmp) = setup();
        let missing = tmp.path().join("nope");
        assert!(Remove { path: s(&missing) }.execute(&engine, &user).is_failure());
        assert!(engine.locks().locked_paths().is_empty());
    }

    #[test]
    fn put_file_end_marker_creates_empty_file_once() {
        let (engine, user, tmp) = setup();
        let file = tmp.path().join("empty");
        let end = PutFile { path: s(&file), bytes: &[] };
        assert!(end.execute(&engine, &user).is_ok());
        assert!(end.execute(&engine, &user).is_ok());
        assert_eq!(fs::read(&file).unwrap(), b"");
    }

    #[test]
    fn put_file_end_marker_does_not_truncate() {
        let (engine, user, tmp) = setup();
        let file = tmp.path().join("f");
        let path = s(&file);
        assert!(PutFile { path, bytes: b"abc" }.execute(&engine, &user).is_ok());
        assert!(PutFile { path, bytes: &[] }.execute(&engine, &user).is_ok());
        assert_eq!(fs::read(&file).unwrap(), b"abc");
    }

    #[test]
    fn put_file_missing_parent_creates_nothing() {
        let (engine, user, tmp) = setup();
        let file = tmp.path().join("no/such/dir/f");
        let res = PutFile { path: s(&file), bytes: b"x" }.execute(&engine, &user);
        assert!(res.is_failure());
        assert!(!file.exists());
    }

    #[test]
    fn put_file_relative_path_is_invalid() {
        let (engine, user, _tmp) = setup();
        let res = PutFile {
            path: "this/path/does/not/exist",
            bytes: &[],
        }
        .execute(&engine, &user);
        assert!(res.error.starts_with("invalid path"), "{}", res.error);
    }

    #[test]
    fn move_renames_and_refuses_overwrite() {
        let (engine, user, tmp) = setup();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::write(&a, b"1").unwrap();
        assert!(Move { src: s(&a), dst: s(&b) }.execute(&engine, &user).is_ok());
        assert!(!a.exists());
        assert_eq!(fs::read(&b).unwrap(), b"1");

        fs::write(&a, b"2").unwrap();
        let res = Move { src: s(&a), dst: s(&b) }.execute(&engine, &user);
        assert!(res.error.contains("already exists"), "{}", res.error);
        assert_eq!(fs::read(&b).unwrap(), b"1");
    }

    #[test]
    fn move_to_missing_parent_names_the_parent() {
        let (engine, user, tmp) = setup();
        let a = tmp.path().join("a");
        fs::write(&a, b"1").unwrap();
        let parent = tmp.path().join("no/such");

        let res = Move {
            src: s(&a),
            dst: s(&parent.join("b")),
        }
        .execute(&engine, &user);
        assert_eq!(res.error, format!("not found: {}", parent.display()));
        assert!(a.exists());
    }

    #[test]
    fn move_into_itself_is_invalid() {
        let (engine, user, tmp) = setup();
        let dir = tmp.path().join("d");
        fs::create_dir(&dir).unwrap();
        let res = Move {
            src: s(&dir),
            dst: s(&dir.join("inner")),
        }
        .execute(&engine, &user);
        assert!(res.error.contains("destination inside source"));
    }
}
