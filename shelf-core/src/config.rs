//! Configuration types
//!
//! Values are loaded from environment variables with development defaults,
//! or assembled with the builder methods.

use crate::{ConfigError, ShelfResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default prefix of the per-author group index key.
pub const DEFAULT_GROUP_INDEX_PREFIX: &str = "grp_";

/// Default LMDB map size in megabytes.
pub const DEFAULT_LMDB_MAX_SIZE_MB: usize = 64;

/// Convert an LMDB map size in megabytes to bytes.
///
/// Zero and sizes whose byte count does not fit in `usize` are rejected.
pub fn lmdb_map_size_bytes(size_mb: usize) -> Result<usize, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        field: "lmdb_max_size_mb".to_string(),
        value: size_mb.to_string(),
        reason: reason.to_string(),
    };
    if size_mb == 0 {
        return Err(invalid("must be greater than zero"));
    }
    size_mb
        .checked_mul(1024 * 1024)
        .ok_or_else(|| invalid("byte size overflows usize"))
}

/// Configuration for the coherence coordinator and its bundled backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoherenceConfig {
    /// Prefix of the group index key (`{prefix}{author}`).
    /// Must match whatever pre-existing cache contents use.
    pub group_index_prefix: String,

    /// Directory for an LMDB-backed remote cache, if one is used.
    pub lmdb_path: Option<PathBuf>,

    /// Maximum size of the LMDB map in megabytes.
    pub lmdb_max_size_mb: usize,

    /// Database file for the SQLite book store, if one is used.
    pub sqlite_path: Option<PathBuf>,
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self {
            group_index_prefix: DEFAULT_GROUP_INDEX_PREFIX.to_string(),
            lmdb_path: None,
            lmdb_max_size_mb: DEFAULT_LMDB_MAX_SIZE_MB,
            sqlite_path: None,
        }
    }
}

impl CoherenceConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create CoherenceConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SHELF_GROUP_INDEX_PREFIX`: group index key prefix (default: "grp_")
    /// - `SHELF_LMDB_PATH`: LMDB directory for the remote tier (default: unset)
    /// - `SHELF_LMDB_MAX_SIZE_MB`: LMDB map size (default: 64)
    /// - `SHELF_SQLITE_PATH`: SQLite database file (default: unset)
    pub fn from_env() -> Self {
        let group_index_prefix = std::env::var("SHELF_GROUP_INDEX_PREFIX")
            .ok()
            .unwrap_or_else(|| DEFAULT_GROUP_INDEX_PREFIX.to_string());

        let lmdb_path = std::env::var("SHELF_LMDB_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let lmdb_max_size_mb = std::env::var("SHELF_LMDB_MAX_SIZE_MB")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_LMDB_MAX_SIZE_MB);

        let sqlite_path = std::env::var("SHELF_SQLITE_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Self {
            group_index_prefix,
            lmdb_path,
            lmdb_max_size_mb,
            sqlite_path,
        }
    }

    /// Set the group index key prefix.
    pub fn with_group_index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.group_index_prefix = prefix.into();
        self
    }

    /// Set the LMDB directory.
    pub fn with_lmdb_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lmdb_path = Some(path.into());
        self
    }

    /// Set the LMDB map size.
    pub fn with_lmdb_max_size_mb(mut self, size_mb: usize) -> Self {
        self.lmdb_max_size_mb = size_mb;
        self
    }

    /// Set the SQLite database file.
    pub fn with_sqlite_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sqlite_path = Some(path.into());
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ShelfResult<()> {
        if self.group_index_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "group_index_prefix".to_string(),
                value: self.group_index_prefix.clone(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        lmdb_map_size_bytes(self.lmdb_max_size_mb)?;
        Ok(())
    }
}
