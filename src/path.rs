//! # Path validation
//!
//! Lexical normalization of caller-supplied paths.
//!
//! ## Responsibility
//! - Clean a path without touching the filesystem (`.`/`..`, duplicate and
//!   trailing separators)
//! - Reject anything that is not absolute after cleaning
//!
//! Symlinks are not resolved: the engine works on the lexical path the caller
//! named, and the lock registry keys on that same form.

use std::path::{Component, Path, PathBuf};

use crate::BrowseError;

/// Lexically clean `path`.
///
/// `..` removes the preceding normal component; at the root it is dropped,
/// in a relative path with nothing to remove it is kept. An empty result
/// becomes `.`.
///
/// # Example
///
/// ```rust
/// use filebrowser_engine::path::clean;
/// use std::path::Path;
///
/// assert_eq!(clean(Path::new("/a/./b/../c//")), Path::new("/a/c"));
/// assert_eq!(clean(Path::new("/../x")), Path::new("/x"));
/// assert_eq!(clean(Path::new("a/../..")), Path::new(".."));
/// ```
pub fn clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

/// Clean `raw` and require the result to be absolute.
///
/// # Errors
///
/// - [`BrowseError::InvalidPath`] if `raw` is empty, contains a NUL byte, or
///   is relative
pub fn validate(raw: &str) -> Result<PathBuf, BrowseError> {
    if raw.is_empty() {
        return Err(BrowseError::InvalidPath {
            path: raw.to_string(),
            reason: "empty",
        });
    }
    if raw.contains('\0') {
        return Err(BrowseError::InvalidPath {
            path: raw.to_string(),
            reason: "contains NUL",
        });
    }
    let cleaned = clean(Path::new(raw));
    if !cleaned.is_absolute() {
        return Err(BrowseError::InvalidPath {
            path: raw.to_string(),
            reason: "not absolute",
        });
    }
    Ok(cleaned)
}
