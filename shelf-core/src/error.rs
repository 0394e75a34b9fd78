//! Error types for SHELF operations

use crate::{EntityType, Tier};
use thiserror::Error;

/// Persistent store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound { entity_type: EntityType, id: String },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Update failed for {entity_type:?} with id {id}: {reason}")]
    UpdateFailed {
        entity_type: EntityType,
        id: String,
        reason: String,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage backend error: {reason}")]
    Backend { reason: String },
}

/// Cache tier errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// A get/set against a tier failed. Never retried by the coordinator.
    #[error("Tier {tier} unavailable: {reason}")]
    TierUnavailable { tier: Tier, reason: String },

    /// Cached content that cannot be decoded, or a version pointer whose
    /// snapshot is missing.
    #[error("Corrupt cache entry at {key} ({entity_type:?}): {reason}")]
    CorruptCacheEntry {
        key: String,
        entity_type: EntityType,
        reason: String,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all SHELF errors.
#[derive(Debug, Clone, Error)]
pub enum ShelfError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl ShelfError {
    /// Shorthand for a failed tier call.
    pub fn tier_unavailable(tier: Tier, reason: impl Into<String>) -> Self {
        ShelfError::Cache(CacheError::TierUnavailable {
            tier,
            reason: reason.into(),
        })
    }

    /// Shorthand for undecodable cache content.
    pub fn corrupt(key: impl Into<String>, entity_type: EntityType, reason: impl Into<String>) -> Self {
        ShelfError::Cache(CacheError::CorruptCacheEntry {
            key: key.into(),
            entity_type,
            reason: reason.into(),
        })
    }

    /// Whether this error came from an unreachable tier.
    pub fn is_tier_unavailable(&self) -> bool {
        matches!(self, ShelfError::Cache(CacheError::TierUnavailable { .. }))
    }

    /// Whether this error came from undecodable cache content.
    pub fn is_corrupt_entry(&self) -> bool {
        matches!(self, ShelfError::Cache(CacheError::CorruptCacheEntry { .. }))
    }
}

/// Result type alias for SHELF operations.
pub type ShelfResult<T> = Result<T, ShelfError>;

// =============================================================================
// TESTS
// =============================================================================
