//! Cache tier traits and cacheable entity marker.
//!
//! This module defines the traits that must be implemented by the remote and
//! local cache tiers, and by entities that can be stored in them.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use shelf_core::{Book, EntityType, ShelfError, ShelfResult, Version};

/// Marker trait for types that can be cached as versioned snapshots.
///
/// # Implementation Requirements
///
/// - `entity_type()` must return a consistent value for all instances
/// - `cache_id()` must return the primary key used in snapshot keys
/// - The serialized form must be stable: snapshots written by one process are
///   read by every other process sharing the remote tier
pub trait CacheableEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Get the entity type for this cacheable.
    fn entity_type() -> EntityType;

    /// Get the primary key of this entity.
    fn cache_id(&self) -> &str;

    /// Serialize into the snapshot representation.
    fn to_cache(&self) -> ShelfResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            ShelfError::corrupt(self.cache_id(), Self::entity_type(), e.to_string())
        })
    }

    /// Deserialize a snapshot read from `key`.
    fn from_cache(key: &str, bytes: &[u8]) -> ShelfResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            tracing::warn!(key, error = %e, "undecodable snapshot");
            ShelfError::corrupt(key, Self::entity_type(), e.to_string())
        })
    }
}

impl CacheableEntity for Book {
    fn entity_type() -> EntityType {
        EntityType::Book
    }

    fn cache_id(&self) -> &str {
        &self.isbn
    }
}

/// Shared key/value tier.
///
/// Values are opaque byte blobs; the coordinator owns their format. The tier
/// has no versioning logic of its own and no eviction contract is assumed.
#[async_trait]
pub trait RemoteCache: Send + Sync {
    /// Get a value, or `None` if the key is absent.
    async fn get(&self, key: &str) -> ShelfResult<Option<Vec<u8>>>;

    /// Store a value, overwriting any previous one.
    async fn set(&self, key: &str, value: Vec<u8>) -> ShelfResult<()>;

    /// Get cache statistics.
    async fn stats(&self) -> ShelfResult<CacheStats>;
}

/// A local-tier entry: a book together with the version the local tier
/// believes is current.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalEntry {
    pub book: Book,
    pub version: Version,
}

impl LocalEntry {
    pub fn new(book: Book, version: Version) -> Self {
        Self { book, version }
    }
}

/// Process-local tier holding at most one entry per isbn.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// Get the entry for `isbn`, if any.
    async fn get(&self, isbn: &str) -> ShelfResult<Option<LocalEntry>>;

    /// Store the entry for `isbn`, replacing any previous one.
    async fn set(&self, isbn: &str, entry: LocalEntry) -> ShelfResult<()>;

    /// Get cache statistics.
    async fn stats(&self) -> ShelfResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of writes.
    pub writes: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Approximate memory usage in bytes.
    pub memory_bytes: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
