//! Runtime configuration for the phrase index.

use std::path::PathBuf;

/// Capacity reported by `memfree` when nothing else is configured (5 MiB).
pub const DEFAULT_CAPACITY_BYTES: u64 = 5_242_880;

/// Configuration for [`PhraseIndex`](crate::PhraseIndex).
///
/// Parsed from environment variables with fallback defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Store capacity used by `memfree` (default 5242880).
    pub capacity_bytes: u64,
    /// SQLite file used by the CLI; `None` means the platform data directory.
    pub store_path: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            store_path: None,
        }
    }
}

impl IndexConfig {
    /// Parses configuration from environment variables.
    ///
    /// Falls back to defaults when env vars not set or invalid.
    ///
    /// # Environment Variables
    ///
    /// - `PHRASEDEX_CAPACITY` (u64, default 5242880): Store capacity in bytes
    /// - `PHRASEDEX_STORE` (path): SQLite store file
    ///
    /// # Examples
    ///
    /// ```
    /// use phrasedex::IndexConfig;
    ///
    /// let config = IndexConfig::from_env();
    /// assert!(config.capacity_bytes > 0);
    /// ```
    pub fn from_env() -> Self {
        let capacity_bytes = std::env::var("PHRASEDEX_CAPACITY")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_CAPACITY_BYTES);

        let store_path = std::env::var("PHRASEDEX_STORE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Self {
            capacity_bytes,
            store_path,
        }
    }

    pub fn with_capacity(mut self, capacity_bytes: u64) -> Self {
        self.capacity_bytes = capacity_bytes;
        self
    }
}
