//! In-memory cache tiers.
//!
//! Uses tokio::sync::RwLock for safe async access. Both tiers keep hit/miss
//! statistics and can be switched offline to exercise failure propagation.
//! The remote tier also records every key it was asked for.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use shelf_core::{ShelfError, ShelfResult, Tier};
use tokio::sync::RwLock;

use super::traits::{CacheStats, LocalCache, LocalEntry, RemoteCache};

/// One operation seen by [`InMemoryRemoteCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOp {
    Get(String),
    Set(String),
}

/// In-memory remote tier.
#[derive(Debug, Default)]
pub struct InMemoryRemoteCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    stats: RwLock<CacheStats>,
    ops: RwLock<Vec<TierOp>>,
    offline: AtomicBool,
}

impl InMemoryRemoteCache {
    /// Create an empty remote tier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `TierUnavailable` (or recover).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Read a raw value without recording an operation.
    pub async fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().await.get(key).cloned()
    }

    /// Read a raw value as UTF-8 without recording an operation.
    pub async fn peek_str(&self, key: &str) -> Option<String> {
        self.peek(key)
            .await
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }

    /// Write a raw value without recording an operation.
    pub async fn seed(&self, key: &str, value: impl Into<Vec<u8>>) {
        self.entries.write().await.insert(key.to_string(), value.into());
    }

    /// Check if a key is present.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// All sorted keys currently stored.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Every operation recorded so far, in call order.
    pub async fn ops(&self) -> Vec<TierOp> {
        self.ops.read().await.clone()
    }

    /// Keys passed to `get`, in call order.
    pub async fn gets(&self) -> Vec<String> {
        self.ops
            .read()
            .await
            .iter()
            .filter_map(|op| match op {
                TierOp::Get(key) => Some(key.clone()),
                TierOp::Set(_) => None,
            })
            .collect()
    }

    /// Keys passed to `set`, in call order.
    pub async fn sets(&self) -> Vec<String> {
        self.ops
            .read()
            .await
            .iter()
            .filter_map(|op| match op {
                TierOp::Set(key) => Some(key.clone()),
                TierOp::Get(_) => None,
            })
            .collect()
    }

    /// Forget recorded operations.
    pub async fn clear_ops(&self) {
        self.ops.write().await.clear();
    }

    fn check_online(&self) -> ShelfResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ShelfError::tier_unavailable(Tier::Remote, "remote cache offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCache for InMemoryRemoteCache {
    async fn get(&self, key: &str) -> ShelfResult<Option<Vec<u8>>> {
        self.check_online()?;
        self.ops.write().await.push(TierOp::Get(key.to_string()));

        let value = self.entries.read().await.get(key).cloned();
        let mut stats = self.stats.write().await;
        if value.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> ShelfResult<()> {
        self.check_online()?;
        self.ops.write().await.push(TierOp::Set(key.to_string()));

        let mut entries = self.entries.write().await;
        let size = value.len() as u64;
        let previous = entries.insert(key.to_string(), value);

        let mut stats = self.stats.write().await;
        stats.writes += 1;
        match previous {
            Some(old) => {
                stats.memory_bytes = stats.memory_bytes.saturating_sub(old.len() as u64) + size;
            }
            None => {
                stats.entry_count += 1;
                stats.memory_bytes += size + key.len() as u64;
            }
        }
        Ok(())
    }

    async fn stats(&self) -> ShelfResult<CacheStats> {
        Ok(self.stats.read().await.clone())
    }
}

/// In-memory local tier, one entry per isbn.
#[derive(Debug, Default)]
pub struct InMemoryLocalCache {
    entries: RwLock<HashMap<String, LocalEntry>>,
    stats: RwLock<CacheStats>,
    offline: AtomicBool,
}

impl InMemoryLocalCache {
    /// Create an empty local tier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an entry without touching statistics.
    pub async fn peek(&self, isbn: &str) -> Option<LocalEntry> {
        self.entries.read().await.get(isbn).cloned()
    }

    /// Number of entries held.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Make every subsequent trait call fail with `TierUnavailable` (or recover).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> ShelfResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ShelfError::tier_unavailable(Tier::Local, "local cache offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl LocalCache for InMemoryLocalCache {
    async fn get(&self, isbn: &str) -> ShelfResult<Option<LocalEntry>> {
        self.check_online()?;
        let entry = self.entries.read().await.get(isbn).cloned();
        let mut stats = self.stats.write().await;
        if entry.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        Ok(entry)
    }

    async fn set(&self, isbn: &str, entry: LocalEntry) -> ShelfResult<()> {
        self.check_online()?;
        let is_new = self
            .entries
            .write()
            .await
            .insert(isbn.to_string(), entry)
            .is_none();

        let mut stats = self.stats.write().await;
        stats.writes += 1;
        if is_new {
            stats.entry_count += 1;
        }
        Ok(())
    }

    async fn stats(&self) -> ShelfResult<CacheStats> {
        Ok(self.stats.read().await.clone())
    }
}
