//! Core types shared by every operation.

use std::fmt;
use std::time::SystemTime;

use crate::BrowseError;

/// Terminal `error` text of a successful [`GetFile`](crate::GetFile) stream.
///
/// Not a failure: it marks the end of the chunk sequence, and is sent even for
/// empty files.
pub const EOF_SENTINEL: &str = "EOF";

/// Opaque identity of the caller.
///
/// Passed through every operation untouched; authorization lives outside the
/// engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct UserToken(String);

impl UserToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for UserToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Type of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link (not followed).
    Symlink,
}

impl From<std::fs::FileType> for FileType {
    fn from(ft: std::fs::FileType) -> Self {
        if ft.is_symlink() {
            FileType::Symlink
        } else if ft.is_dir() {
            FileType::Directory
        } else {
            FileType::File
        }
    }
}

/// Unix-style permissions stored as a mode bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Permissions(u32);

impl Permissions {
    /// Create permissions from a Unix mode (e.g., 0o755).
    #[inline]
    pub const fn from_mode(mode: u32) -> Self {
        Self(mode & 0o7777)
    }

    /// Get the raw mode value.
    #[inline]
    pub const fn mode(&self) -> u32 {
        self.0
    }

    /// Returns `true` if these permissions deny writing.
    #[inline]
    pub const fn readonly(&self) -> bool {
        (self.0 & 0o222) == 0
    }

    #[cfg(unix)]
    fn of(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::PermissionsExt;
        Self::from_mode(meta.permissions().mode())
    }

    #[cfg(not(unix))]
    fn of(meta: &std::fs::Metadata) -> Self {
        if meta.permissions().readonly() {
            Self::from_mode(0o444)
        } else {
            Self::from_mode(0o644)
        }
    }
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Entry {
    /// Name of the entry (filename only, not full path).
    pub name: String,
    /// Type of the entry.
    pub file_type: FileType,
    /// Size in bytes.
    pub size: u64,
    /// Permission bits.
    pub mode: Permissions,
    /// Last modification time.
    #[cfg_attr(feature = "serde", serde(with = "system_time_serde"))]
    pub modified: SystemTime,
}

impl Entry {
    /// Build an entry from a name and its (non-followed) metadata.
    pub fn from_metadata(name: String, meta: &std::fs::Metadata) -> Self {
        Self {
            name,
            file_type: meta.file_type().into(),
            size: meta.len(),
            mode: Permissions::of(meta),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }

    /// Returns `true` if this is a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// Returns `true` if this is a regular file.
    #[inline]
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }
}

/// One piece of a streamed file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chunk {
    /// 1-based position of this piece.
    pub index: u64,
    /// Number of pieces the file is split into.
    pub total: u64,
    /// Raw content.
    pub bytes: Vec<u8>,
}

/// The message returned or streamed by every operation.
///
/// An empty `error` means success. `entries` is only filled by a listing and
/// `chunk` only by a file read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpResult {
    /// Failure description, empty on success.
    #[cfg_attr(feature = "serde", serde(default))]
    pub error: String,
    /// Directory listing.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Vec::is_empty")
    )]
    pub entries: Vec<Entry>,
    /// Transfer payload.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub chunk: Option<Chunk>,
}

impl OpResult {
    /// Plain success.
    pub fn ok() -> Self {
        Self::default()
    }

    /// A failure carrying the error's display text.
    pub fn failure(err: &BrowseError) -> Self {
        Self {
            error: err.to_string(),
            ..Self::default()
        }
    }

    /// A directory listing.
    pub fn listing(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    /// A content chunk.
    pub fn chunk(index: u64, total: u64, bytes: Vec<u8>) -> Self {
        Self {
            chunk: Some(Chunk {
                index,
                total,
                bytes,
            }),
            ..Self::default()
        }
    }

    /// The end-of-stream marker of a file read.
    pub fn eof() -> Self {
        Self {
            error: EOF_SENTINEL.to_string(),
            ..Self::default()
        }
    }

    /// `true` when `error` is empty.
    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }

    /// `true` for the end-of-stream marker.
    pub fn is_eof(&self) -> bool {
        self.error == EOF_SENTINEL
    }

    /// `true` for a real failure (non-empty and not the sentinel).
    pub fn is_failure(&self) -> bool {
        !self.error.is_empty() && !self.is_eof()
    }
}

impl From<Result<OpResult, BrowseError>> for OpResult {
    fn from(result: Result<OpResult, BrowseError>) -> Self {
        result.unwrap_or_else(|e| OpResult::failure(&e))
    }
}

/// Final component of `path` as an owned string.
pub(crate) fn entry_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Serde support for SystemTime (when serde feature is enabled).
#[cfg(feature = "serde")]
mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        (duration.as_secs(), duration.subsec_nanos()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (secs, nanos): (u64, u32) = Deserialize::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::new(secs, nanos))
    }
}
