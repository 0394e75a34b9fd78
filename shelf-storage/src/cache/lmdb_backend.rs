//! LMDB-backed remote tier.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped,
//! process-independent key/value store. Several processes opening the same
//! directory share one remote tier.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The backend uses:
//! - Read transactions for `get`
//! - Write transactions for `set`
//! - Statistics are tracked behind a lock local to this process

use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use shelf_core::{
    lmdb_map_size_bytes, CoherenceConfig, ConfigError, ShelfError, ShelfResult, Tier,
};

use super::traits::{CacheStats, RemoteCache};

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unusable map size.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration errors pass through; every other LMDB failure is an
/// unavailable remote tier to the coordinator.
impl From<LmdbCacheError> for ShelfError {
    fn from(e: LmdbCacheError) -> Self {
        match e {
            LmdbCacheError::Config(e) => ShelfError::Config(e),
            e => ShelfError::tier_unavailable(Tier::Remote, e.to_string()),
        }
    }
}

/// LMDB-backed remote tier.
///
/// # Example
///
/// ```ignore
/// use shelf_storage::cache::LmdbRemoteCache;
///
/// let remote = LmdbRemoteCache::new("/var/cache/shelf", 64)?;
/// remote.set("v_1111", b"1".to_vec()).await?;
/// ```
pub struct LmdbRemoteCache {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    /// Process-local statistics.
    stats: RwLock<CacheStats>,
}

impl LmdbRemoteCache {
    /// Create a new LMDB remote tier.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_size_mb` is zero or too large to express in bytes
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        let map_size = lmdb_map_size_bytes(max_size_mb)?;
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "opened LMDB remote tier");

        Ok(Self {
            env,
            db,
            stats: RwLock::new(CacheStats::default()),
        })
    }

    /// Open the tier described by `config.lmdb_path`.
    pub fn from_config(config: &CoherenceConfig) -> ShelfResult<Self> {
        config.validate()?;
        let path = config.lmdb_path.as_ref().ok_or_else(|| ConfigError::MissingRequired {
            field: "lmdb_path".to_string(),
        })?;
        Ok(Self::new(path, config.lmdb_max_size_mb)?)
    }

    /// Number of keys stored in the environment.
    pub fn len(&self) -> Result<u64, LmdbCacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        self.db
            .len(&rtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, LmdbCacheError> {
        Ok(self.len()? == 0)
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }
}

#[async_trait]
impl RemoteCache for LmdbRemoteCache {
    async fn get(&self, key: &str) -> ShelfResult<Option<Vec<u8>>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let value = self
            .db
            .get(&rtxn, key.as_bytes())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
            .map(<[u8]>::to_vec);

        if value.is_some() {
            self.record(|stats| stats.hits += 1);
        } else {
            self.record(|stats| stats.misses += 1);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> ShelfResult<()> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let is_new = self
            .db
            .get(&wtxn, key.as_bytes())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
            .is_none();

        self.db
            .put(&mut wtxn, key.as_bytes(), &value)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.record(|stats| {
            stats.writes += 1;
            if is_new {
                stats.entry_count += 1;
            }
            stats.memory_bytes += value.len() as u64;
        });
        Ok(())
    }

    async fn stats(&self) -> ShelfResult<CacheStats> {
        self.stats
            .read()
            .map(|stats| stats.clone())
            .map_err(|_| ShelfError::tier_unavailable(Tier::Remote, "stats lock poisoned"))
    }
}
