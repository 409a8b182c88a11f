//! Path locking for mutually exclusive operations.
//!
//! This module provides [`PathLocks`], the registry of paths currently being
//! mutated by an in-flight operation, and [`PathGuard`], the scoped handle
//! that releases a path when the operation ends.
//!
//! # Overview
//!
//! A path counts as locked when it is marked itself or when any of its
//! ancestors is marked:
//!
//! - locking `/data` makes `/data/a/b.txt` busy
//! - locking `/data/a/b.txt` leaves `/data/c` free
//!
//! Acquisition is fail-fast: an operation that finds its path busy reports
//! [`BrowseError::Busy`] instead of waiting.
//!
//! # Example
//!
//! ```rust
//! use filebrowser_engine::{BrowseError, PathLocks};
//! use std::path::Path;
//!
//! let locks = PathLocks::new();
//! let guard = locks.try_acquire(Path::new("/data")).unwrap();
//!
//! assert!(locks.is_locked(Path::new("/data/report.csv")));
//! assert!(matches!(
//!     locks.try_acquire(Path::new("/data/report.csv")),
//!     Err(BrowseError::Busy { .. })
//! ));
//!
//! drop(guard);
//! assert!(!locks.is_locked(Path::new("/data/report.csv")));
//! ```
//!
//! # Thread Safety
//!
//! The registry is a cheaply cloneable handle to one shared map behind a
//! mutex. Every check-and-mark happens inside a single critical section.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::BrowseError;

/// Registry of busy paths.
///
/// Unlocked paths keep a `false` entry; `false` and absent mean the same.
#[derive(Debug, Clone, Default)]
pub struct PathLocks {
    state: Arc<Mutex<HashMap<PathBuf, bool>>>,
}

impl PathLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HashMap<PathBuf, bool>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `path` busy.
    pub fn lock(&self, path: &Path) {
        self.state().insert(path.to_path_buf(), true);
    }

    /// Clear the mark on `path`.
    pub fn unlock(&self, path: &Path) {
        self.state().insert(path.to_path_buf(), false);
    }

    /// `true` if `path` or any of its ancestors is marked.
    pub fn is_locked(&self, path: &Path) -> bool {
        marked_or_ancestor(&self.state(), path)
    }

    /// `true` if `path`, an ancestor or a descendant is marked.
    ///
    /// This is the rule [`try_acquire`](Self::try_acquire) refuses on; use it
    /// to check a path an operation reads as a whole tree without holding it.
    pub fn conflicts(&self, path: &Path) -> bool {
        overlaps(&self.state(), path)
    }

    /// Atomically check that `path` is free and mark it.
    ///
    /// # Errors
    ///
    /// - [`BrowseError::Busy`] if `path`, an ancestor or a descendant is
    ///   already marked
    pub fn try_acquire(&self, path: &Path) -> Result<PathGuard, BrowseError> {
        self.try_acquire_all(&[path])
    }

    /// Acquire several paths at once, all or nothing.
    ///
    /// Nothing is marked if any path conflicts.
    ///
    /// # Errors
    ///
    /// - [`BrowseError::Busy`] naming the first conflicting path
    pub fn try_acquire_all(&self, paths: &[&Path]) -> Result<PathGuard, BrowseError> {
        let mut state = self.state();
        if let Some(busy) = paths.iter().find(|p| overlaps(&state, p)) {
            return Err(BrowseError::Busy {
                path: busy.to_path_buf(),
            });
        }
        for path in paths {
            state.insert(path.to_path_buf(), true);
        }
        Ok(PathGuard {
            locks: self.clone(),
            paths: paths.iter().map(|p| p.to_path_buf()).collect(),
        })
    }

    /// Snapshot of the currently marked paths, sorted.
    pub fn locked_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .state()
            .iter()
            .filter(|(_, busy)| **busy)
            .map(|(p, _)| p.clone())
            .collect();
        paths.sort();
        paths
    }
}

fn marked_or_ancestor(state: &HashMap<PathBuf, bool>, path: &Path) -> bool {
    path.ancestors()
        .any(|p| state.get(p).copied().unwrap_or(false))
}

fn overlaps(state: &HashMap<PathBuf, bool>, path: &Path) -> bool {
    marked_or_ancestor(state, path) || state.iter().any(|(p, busy)| *busy && p.starts_with(path))
}

/// Scoped hold on one or more paths; releases them on drop.
#[derive(Debug)]
#[must_use = "the paths are released as soon as the guard is dropped"]
pub struct PathGuard {
    locks: PathLocks,
    paths: Vec<PathBuf>,
}

impl PathGuard {
    /// Paths held by this guard.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        let mut state = self.locks.state();
        for path in &self.paths {
            state.insert(path.clone(), false);
        }
    }
}
