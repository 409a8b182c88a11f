//! Engine configuration.

use crate::BrowseError;

/// Default size of one streamed file piece (64 KiB).
///
/// Peak memory of a transfer is bounded by one chunk, whatever the file size.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Tunables for an [`Engine`](crate::Engine).
///
/// # Example
///
/// ```rust
/// use filebrowser_engine::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_chunk_size(4096)
///     .with_sync_writes(false);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Bytes per streamed chunk.
    pub chunk_size: usize,
    /// Flush every appended chunk to disk before returning.
    pub sync_writes: bool,
    /// Copy the targets of symlinks instead of the links themselves.
    pub follow_symlinks: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            sync_writes: true,
            follow_symlinks: false,
        }
    }
}

impl EngineConfig {
    /// Set the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Enable or disable `sync_data` after each append.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Enable or disable following symlinks during copies.
    pub fn with_follow_symlinks(mut self, follow_symlinks: bool) -> Self {
        self.follow_symlinks = follow_symlinks;
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), BrowseError> {
        if self.chunk_size == 0 {
            return Err(BrowseError::Config("chunk_size must be non-zero".into()));
        }
        Ok(())
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, BrowseError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BrowseError::Deserialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
