//! Coherence coordinator.
//!
//! Keeps the local tier, the shared remote tier and the persistent store
//! coherent using per-book version numbers. Staleness is detected by comparing
//! versions, never prevented: nothing is ever invalidated or deleted.
//!
//! Every public operation runs its tier steps strictly in sequence. Concurrent
//! callers are not coordinated. Two writers to the same isbn may both observe
//! version `v` and both publish `v + 1`, in which case one snapshot is lost.

use std::sync::Arc;

use shelf_core::{
    AuthorReport, Book, CoherenceConfig, EntityType, ShelfError, ShelfResult, StorageError,
    Version,
};
use tracing::{debug, warn};

use super::codec::{
    decode_group_index, decode_report, decode_version, encode_group_index, encode_report,
    encode_version,
};
use super::keys::{group_index_key, snapshot_key, version_pointer_key, CompositeKey};
use super::report::compute_author_report;
use super::tier_read::{ReadSource, TierRead};
use super::traits::{CacheableEntity, LocalCache, LocalEntry, RemoteCache};
use crate::BookStore;

/// Version assigned to a book the first time it is cached remotely.
pub const INITIAL_VERSION: Version = 1;

/// Coordinates reads and writes across the three tiers.
///
/// # Type Parameters
///
/// - `S`: the persistent store of record
/// - `R`: the remote tier shared by every coordinator instance
/// - `L`: the local tier owned by this instance
///
/// # Example
///
/// ```ignore
/// let coordinator = CoherenceCoordinator::with_defaults(store, remote, local);
///
/// let book = coordinator.find_by_isbn("1111").await?;
/// let report = coordinator.find_by_author("author1").await?;
/// coordinator.update_book(&changed).await?;
/// ```
pub struct CoherenceCoordinator<S, R, L>
where
    S: BookStore,
    R: RemoteCache,
    L: LocalCache,
{
    store: Arc<S>,
    remote: Arc<R>,
    local: Arc<L>,
    config: CoherenceConfig,
}

impl<S, R, L> Clone for CoherenceCoordinator<S, R, L>
where
    S: BookStore,
    R: RemoteCache,
    L: LocalCache,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            remote: Arc::clone(&self.remote),
            local: Arc::clone(&self.local),
            config: self.config.clone(),
        }
    }
}

impl<S, R, L> CoherenceCoordinator<S, R, L>
where
    S: BookStore,
    R: RemoteCache,
    L: LocalCache,
{
    /// Create a coordinator over the given tiers.
    ///
    /// Fails if `config` does not validate.
    pub fn new(
        store: Arc<S>,
        remote: Arc<R>,
        local: Arc<L>,
        config: CoherenceConfig,
    ) -> ShelfResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            remote,
            local,
            config,
        })
    }

    /// Create a coordinator with the default configuration.
    pub fn with_defaults(store: Arc<S>, remote: Arc<R>, local: Arc<L>) -> Self {
        Self {
            store,
            remote,
            local,
            config: CoherenceConfig::default(),
        }
    }

    /// Another coordinator over the same store and remote tier, owning
    /// `local` instead of this instance's local tier.
    pub fn sibling(&self, local: Arc<L>) -> Self {
        Self {
            store: Arc::clone(&self.store),
            remote: Arc::clone(&self.remote),
            local,
            config: self.config.clone(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &CoherenceConfig {
        &self.config
    }

    /// Get a reference to the persistent store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a reference to the remote tier.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Get a reference to the local tier.
    pub fn local(&self) -> &L {
        &self.local
    }

    /// Start the underlying store.
    pub async fn start_up(&self) -> ShelfResult<()> {
        debug!("starting book store");
        self.store.start_up().await
    }

    /// Shut the underlying store down.
    pub async fn shut_down(&self) -> ShelfResult<()> {
        debug!("shutting book store down");
        self.store.shut_down().await
    }

    // ------------------------------------------------------------------------
    // Single-book read
    // ------------------------------------------------------------------------

    /// Get the current content of a book.
    ///
    /// 1. A local entry whose version equals the version pointer is returned
    ///    without reading any snapshot.
    /// 2. Otherwise, if a pointer exists, its snapshot is loaded and replaces
    ///    the local entry.
    /// 3. With no pointer the book is read from the store and seeded at
    ///    version 1 in both tiers.
    ///
    /// Returns `Ok(None)` when the store has no such book; no tier is written
    /// in that case.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_isbn(&self, isbn: &str) -> ShelfResult<Option<TierRead<Book>>> {
        let local = self.local.get(isbn).await?;
        let pointer = self.read_version(isbn).await?;

        match (local, pointer) {
            (Some(entry), Some(version)) if entry.version == version => {
                debug!(version, "local entry is current");
                Ok(Some(TierRead::versioned(entry.book, version, ReadSource::Local)))
            }
            (local, Some(version)) => {
                debug!(
                    version,
                    local_version = local.map(|e| e.version),
                    "loading snapshot"
                );
                let book = self.load_snapshot(isbn, version).await?;
                self.local
                    .set(isbn, LocalEntry::new(book.clone(), version))
                    .await?;
                Ok(Some(TierRead::versioned(book, version, ReadSource::Remote)))
            }
            (_, None) => {
                let Some(book) = self.store.find_by_isbn(isbn).await? else {
                    debug!("not in store");
                    return Ok(None);
                };
                debug!("cold read, seeding version {INITIAL_VERSION}");
                self.seed_remote(&book).await?;
                self.local
                    .set(isbn, LocalEntry::new(book.clone(), INITIAL_VERSION))
                    .await?;
                Ok(Some(TierRead::versioned(
                    book,
                    INITIAL_VERSION,
                    ReadSource::Store,
                )))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Grouped read
    // ------------------------------------------------------------------------

    /// Get the report over every book by `author`.
    ///
    /// The report is cached under a composite key embedding each member's
    /// version, so a cached report is returned only while no member has moved
    /// on. A stale report is never touched; a new one is written beside it.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_author(&self, author: &str) -> ShelfResult<TierRead<AuthorReport>> {
        let index_key = group_index_key(&self.config.group_index_prefix, author);

        let Some(raw) = self.remote.get(&index_key).await? else {
            return self.build_group(author, &index_key).await;
        };
        let isbns = decode_group_index(&index_key, &raw)?;

        let mut key = CompositeKey::new(author);
        for isbn in &isbns {
            let version = self.resolve_version(isbn).await?;
            key.push(isbn.as_str(), version);
        }
        let report_key = key.encode();

        if let Some(raw) = self.remote.get(&report_key).await? {
            debug!(key = %report_key, "cached report");
            let report = decode_report(&report_key, &raw)?;
            return Ok(TierRead::derived(report, ReadSource::Remote));
        }

        debug!(key = %report_key, "rebuilding report from snapshots");
        let mut books = Vec::with_capacity(key.members().len());
        for (isbn, version) in key.members() {
            books.push(self.load_snapshot(isbn, *version).await?);
        }
        let report = compute_author_report(&books);
        self.remote
            .set(&report_key, encode_report(&report_key, &report)?)
            .await?;
        Ok(TierRead::derived(report, ReadSource::Computed))
    }

    /// First read of a group: index it from the store and cache a report.
    async fn build_group(
        &self,
        author: &str,
        index_key: &str,
    ) -> ShelfResult<TierRead<AuthorReport>> {
        let books = self.store.find_by_author(author).await?;
        debug!(count = books.len(), "indexing group from store");

        self.remote
            .set(
                index_key,
                encode_group_index(books.iter().map(|b| b.isbn.as_str())),
            )
            .await?;

        let mut key = CompositeKey::new(author);
        for book in &books {
            let version = match self.read_version(&book.isbn).await? {
                Some(version) => version,
                None => self.seed_remote(book).await?,
            };
            key.push(book.isbn.as_str(), version);
        }

        let report = compute_author_report(&books);
        let report_key = key.encode();
        self.remote
            .set(&report_key, encode_report(&report_key, &report)?)
            .await?;
        Ok(TierRead::derived(report, ReadSource::Computed))
    }

    // ------------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------------

    /// Persist `book` and publish a new version to tiers that already hold it.
    ///
    /// Returns the new version, or `None` when the book had no version pointer
    /// and therefore no cache presence. The group index and cached reports are
    /// left as they are.
    #[tracing::instrument(skip(self, book), fields(isbn = %book.isbn))]
    pub async fn update_book(&self, book: &Book) -> ShelfResult<Option<Version>> {
        self.store.update(book).await?;

        let Some(current) = self.read_version(&book.isbn).await? else {
            debug!("no cache presence, stopping at store");
            return Ok(None);
        };
        let next = current + 1;

        self.remote
            .set(&version_pointer_key(&book.isbn), encode_version(next))
            .await?;
        self.remote
            .set(&snapshot_key(&book.isbn, next), book.to_cache()?)
            .await?;

        if self.local.get(&book.isbn).await?.is_some() {
            self.local
                .set(&book.isbn, LocalEntry::new(book.clone(), next))
                .await?;
        }
        debug!(from = current, to = next, "published new version");
        Ok(Some(next))
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    async fn read_version(&self, isbn: &str) -> ShelfResult<Option<Version>> {
        let key = version_pointer_key(isbn);
        match self.remote.get(&key).await? {
            Some(raw) => decode_version(&key, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// A pointer without its snapshot is corrupt; the store is not consulted.
    async fn load_snapshot(&self, isbn: &str, version: Version) -> ShelfResult<Book> {
        let key = snapshot_key(isbn, version);
        let raw = self.remote.get(&key).await?.ok_or_else(|| {
            warn!(key = %key, "version pointer names a missing snapshot");
            ShelfError::corrupt(
                key.as_str(),
                EntityType::Book,
                "snapshot missing for current version",
            )
        })?;
        Book::from_cache(&key, &raw)
    }

    /// Write pointer and snapshot at the initial version.
    async fn seed_remote(&self, book: &Book) -> ShelfResult<Version> {
        self.remote
            .set(
                &version_pointer_key(&book.isbn),
                encode_version(INITIAL_VERSION),
            )
            .await?;
        self.remote
            .set(&snapshot_key(&book.isbn, INITIAL_VERSION), book.to_cache()?)
            .await?;
        Ok(INITIAL_VERSION)
    }

    /// Current version of an indexed book, seeding it from the store if needed.
    async fn resolve_version(&self, isbn: &str) -> ShelfResult<Version> {
        if let Some(version) = self.read_version(isbn).await? {
            return Ok(version);
        }
        let book = self.store.find_by_isbn(isbn).await?.ok_or_else(|| {
            StorageError::NotFound {
                entity_type: EntityType::Book,
                id: isbn.to_string(),
            }
        })?;
        debug!(isbn, "indexed book has no pointer, seeding");
        self.seed_remote(&book).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::{InMemoryLocalCache, InMemoryRemoteCache};
    use crate::InMemoryBookStore;
    use shelf_core::{CacheError, Tier};

    type TestCoordinator =
        CoherenceCoordinator<InMemoryBookStore, InMemoryRemoteCache, InMemoryLocalCache>;

    fn book(isbn: &str, title: &str, author: &str) -> Book {
        Book::new(isbn, title, author, 11.1, "genre1", 11)
    }

    fn setup(books: Vec<Book>) -> TestCoordinator {
        let store = InMemoryBookStore::with_books(books).unwrap();
        CoherenceCoordinator::with_defaults(
            Arc::new(store),
            Arc::new(InMemoryRemoteCache::new()),
            Arc::new(InMemoryLocalCache::new()),
        )
    }

    #[tokio::test]
    async fn test_cold_read_seeds_version_one() {
        let book1 = book("1111", "title1", "author1");
        let coordinator = setup(vec![book1.clone()]);

        let read = coordinator.find_by_isbn("1111").await.unwrap().unwrap();
        assert_eq!(read.source(), ReadSource::Store);
        assert_eq!(read.version(), Some(1));
        assert_eq!(read.into_value(), book1);

        let remote = coordinator.remote();
        assert_eq!(remote.peek_str("v_1111").await.as_deref(), Some("1"));
        assert!(remote.contains("1111_1").await);
        assert_eq!(coordinator.local().peek("1111").await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_unknown_isbn_writes_nothing() {
        let coordinator = setup(vec![]);
        assert!(coordinator.find_by_isbn("9999").await.unwrap().is_none());
        assert!(coordinator.remote().sets().await.is_empty());
        assert!(coordinator.local().is_empty().await);
    }

    #[tokio::test]
    async fn test_second_read_is_local_hit() {
        let coordinator = setup(vec![book("1111", "title1", "author1")]);
        coordinator.find_by_isbn("1111").await.unwrap();
        coordinator.remote().clear_ops().await;

        let read = coordinator.find_by_isbn("1111").await.unwrap().unwrap();
        assert!(read.was_local_hit());
        assert_eq!(coordinator.remote().gets().await, vec!["v_1111"]);
    }

    #[tokio::test]
    async fn test_stale_local_entry_is_replaced_from_snapshot() {
        let coordinator = setup(vec![book("1111", "title1", "author1")]);
        coordinator.find_by_isbn("1111").await.unwrap();

        let mut newer = book("1111", "title1 revised", "author1");
        newer.quantity = 3;
        let remote = coordinator.remote();
        remote.seed("v_1111", "2").await;
        remote.seed("1111_2", newer.to_cache().unwrap()).await;

        let read = coordinator.find_by_isbn("1111").await.unwrap().unwrap();
        assert_eq!(read.source(), ReadSource::Remote);
        assert_eq!(read.version(), Some(2));
        assert_eq!(read.value(), &newer);
        assert_eq!(coordinator.local().peek("1111").await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_pointer_without_snapshot_is_corrupt() {
        let coordinator = setup(vec![book("1111", "title1", "author1")]);
        coordinator.remote().seed("v_1111", "4").await;

        let err = coordinator.find_by_isbn("1111").await.unwrap_err();
        assert!(err.is_corrupt_entry());
    }

    #[tokio::test]
    async fn test_update_without_pointer_only_touches_store() {
        let coordinator = setup(vec![book("1111", "title1", "author1")]);
        let mut changed = book("1111", "title1", "author1");
        changed.price = 1.0;

        assert_eq!(coordinator.update_book(&changed).await.unwrap(), None);
        assert_eq!(coordinator.store().get("1111"), Some(changed));
        assert!(coordinator.remote().sets().await.is_empty());
        assert!(coordinator.local().is_empty().await);
    }

    #[tokio::test]
    async fn test_update_bumps_pointer_and_local_entry() {
        let coordinator = setup(vec![book("1111", "title1", "author1")]);
        coordinator.find_by_isbn("1111").await.unwrap();

        let mut changed = book("1111", "title1", "author1");
        changed.quantity = 1;
        assert_eq!(coordinator.update_book(&changed).await.unwrap(), Some(2));

        let remote = coordinator.remote();
        assert_eq!(remote.peek_str("v_1111").await.as_deref(), Some("2"));
        assert!(remote.contains("1111_1").await);
        assert!(remote.contains("1111_2").await);
        let entry = coordinator.local().peek("1111").await.unwrap();
        assert_eq!(entry, LocalEntry::new(changed, 2));
    }

    #[tokio::test]
    async fn test_update_with_pointer_but_no_store_row_publishes_next_version() {
        let cached = book("1111", "title1", "author1");
        let coordinator = setup(vec![]);
        let remote = coordinator.remote();
        remote.seed("v_1111", "1").await;
        remote.seed("1111_1", cached.to_cache().unwrap()).await;

        let mut changed = cached.clone();
        changed.quantity = 0;
        assert_eq!(coordinator.update_book(&changed).await.unwrap(), Some(2));

        assert_eq!(coordinator.store().get("1111"), None);
        assert_eq!(remote.peek_str("v_1111").await.as_deref(), Some("2"));
        let snapshot = remote.peek("1111_2").await.unwrap();
        assert_eq!(Book::from_cache("1111_2", &snapshot).unwrap(), changed);
        assert!(coordinator.local().is_empty().await);
    }

    #[tokio::test]
    async fn test_update_with_poisoned_store_is_store_unavailable() {
        let coordinator = setup(vec![book("1111", "title1", "author1")]);
        coordinator.find_by_isbn("1111").await.unwrap();

        let books = Arc::clone(&coordinator.store().books);
        let panicked = std::thread::spawn(move || {
            let _guard = books.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(panicked.is_err());

        let err = coordinator
            .update_book(&book("1111", "title1 revised", "author1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ShelfError::Cache(CacheError::TierUnavailable {
                tier: Tier::Store,
                ..
            })
        ));
        let remote = coordinator.remote();
        assert_eq!(remote.peek_str("v_1111").await.as_deref(), Some("1"));
        assert!(!remote.contains("1111_2").await);
    }

    #[tokio::test]
    async fn test_update_with_local_offline_is_local_unavailable() {
        let coordinator = setup(vec![book("1111", "title1", "author1")]);
        coordinator.find_by_isbn("1111").await.unwrap();
        coordinator.local().set_offline(true);

        let mut changed = book("1111", "title1", "author1");
        changed.quantity = 2;
        let err = coordinator.update_book(&changed).await.unwrap_err();
        assert!(matches!(
            err,
            ShelfError::Cache(CacheError::TierUnavailable {
                tier: Tier::Local,
                ..
            })
        ));

        // Steps before the local tier have already happened.
        assert_eq!(coordinator.store().get("1111"), Some(changed));
        assert_eq!(coordinator.remote().peek_str("v_1111").await.as_deref(), Some("2"));
        coordinator.local().set_offline(false);
        assert_eq!(coordinator.local().peek("1111").await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_group_report_cached_then_reused() {
        let coordinator = setup(vec![
            book("1111", "title1", "author1"),
            book("2222", "title2", "author2"),
            book("3333", "title3", "author1"),
        ]);

        let first = coordinator.find_by_author("author1").await.unwrap();
        assert!(first.was_computed());
        assert_eq!(
            coordinator.remote().peek_str("grp_author1").await.as_deref(),
            Some("1111,3333")
        );
        assert!(coordinator.remote().contains("author1_1111_1_3333_1").await);

        let second = coordinator.find_by_author("author1").await.unwrap();
        assert_eq!(second.source(), ReadSource::Remote);
        assert_eq!(second.value(), first.value());
    }

    #[tokio::test]
    async fn test_group_without_books_caches_empty_report() {
        let coordinator = setup(vec![book("1111", "title1", "author1")]);

        let read = coordinator.find_by_author("nobody").await.unwrap();
        assert!(read.value().is_empty());
        assert_eq!(read.value().value, 0.0);
        assert_eq!(coordinator.remote().peek_str("grp_nobody").await.as_deref(), Some(""));
        assert!(coordinator.remote().contains("nobody_").await);

        let again = coordinator.find_by_author("nobody").await.unwrap();
        assert_eq!(again.source(), ReadSource::Remote);
    }

    #[tokio::test]
    async fn test_indexed_member_missing_from_store_is_not_found() {
        let coordinator = setup(vec![]);
        coordinator.remote().seed("grp_author1", "1111").await;

        let err = coordinator.find_by_author("author1").await.unwrap_err();
        assert!(matches!(
            err,
            ShelfError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_custom_group_prefix() {
        let store = InMemoryBookStore::with_books([book("1111", "title1", "author1")]).unwrap();
        let coordinator = CoherenceCoordinator::new(
            Arc::new(store),
            Arc::new(InMemoryRemoteCache::new()),
            Arc::new(InMemoryLocalCache::new()),
            CoherenceConfig::new().with_group_index_prefix("bks_"),
        )
        .unwrap();

        coordinator.find_by_author("author1").await.unwrap();
        assert!(coordinator.remote().contains("bks_author1").await);
        assert!(!coordinator.remote().contains("grp_author1").await);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = CoherenceCoordinator::new(
            Arc::new(InMemoryBookStore::new()),
            Arc::new(InMemoryRemoteCache::new()),
            Arc::new(InMemoryLocalCache::new()),
            CoherenceConfig::new().with_group_index_prefix(""),
        );
        assert!(result.is_err());
    }
}
