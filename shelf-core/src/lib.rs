//! SHELF Core - Entity Types
//!
//! Pure data structures shared by every tier: the book record, the derived
//! author report, error types and configuration. No tier logic lives here.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;

pub use config::{
    lmdb_map_size_bytes, CoherenceConfig, DEFAULT_GROUP_INDEX_PREFIX, DEFAULT_LMDB_MAX_SIZE_MB,
};
pub use entities::{AuthorReport, Book, BookSummary};
pub use enums::{EntityType, Tier};
pub use error::{CacheError, ConfigError, ShelfError, ShelfResult, StorageError};

/// Per-entity version number. Versions start at 1 and only move forward.
pub type Version = u64;
