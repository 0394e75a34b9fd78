//! SHELF Storage - Tier Traits, Backends and the Coherence Coordinator
//!
//! Defines the persistent store abstraction, the cache tiers and the
//! coordinator that keeps them coherent with per-book version numbers.

pub mod cache;
pub mod sqlite_store;

pub use cache::{
    compute_author_report, CacheStats, CacheableEntity, CoherenceCoordinator, CompositeKey,
    InMemoryLocalCache, InMemoryRemoteCache, LmdbCacheError, LmdbRemoteCache, LocalCache,
    LocalEntry, ReadSource, RemoteCache, TierOp, TierRead,
};
pub use sqlite_store::SqliteBookStore;

use async_trait::async_trait;
use shelf_core::{Book, EntityType, ShelfError, ShelfResult, StorageError, Tier};
use std::sync::{Arc, RwLock};

// ============================================================================
// BOOK STORE TRAIT
// ============================================================================

/// Persistent store of record for books.
///
/// The coordinator treats every call as an opaque round trip. The order of
/// `find_by_author` results is authoritative: group indexes and composite
/// report keys are built in exactly that order.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Prepare the store for use.
    async fn start_up(&self) -> ShelfResult<()> {
        Ok(())
    }

    /// Release store resources.
    async fn shut_down(&self) -> ShelfResult<()> {
        Ok(())
    }

    /// Get a book by isbn.
    async fn find_by_isbn(&self, isbn: &str) -> ShelfResult<Option<Book>>;

    /// Get every book by `author`, in store order.
    async fn find_by_author(&self, author: &str) -> ShelfResult<Vec<Book>>;

    /// Overwrite the book with the same isbn. Last write wins.
    ///
    /// Matching no row is not an error. A store that cannot be reached
    /// reports `TierUnavailable(Store)`.
    async fn update(&self, book: &Book) -> ShelfResult<()>;
}

// ============================================================================
// IN-MEMORY BOOK STORE
// ============================================================================

fn poisoned() -> ShelfError {
    ShelfError::tier_unavailable(Tier::Store, "book store lock poisoned")
}

/// In-memory book store for testing.
///
/// Rows are kept in insertion order, which is the order `find_by_author`
/// returns them in.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBookStore {
    books: Arc<RwLock<Vec<Book>>>,
}

impl InMemoryBookStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `books`, in order.
    pub fn with_books(books: impl IntoIterator<Item = Book>) -> ShelfResult<Self> {
        let store = Self::new();
        for book in books {
            store.insert(book)?;
        }
        Ok(store)
    }

    /// Insert a new book. Fails if the isbn already exists.
    pub fn insert(&self, book: Book) -> ShelfResult<()> {
        let mut books = self.books.write().map_err(|_| poisoned())?;
        if books.iter().any(|b| b.isbn == book.isbn) {
            return Err(ShelfError::Storage(StorageError::InsertFailed {
                entity_type: EntityType::Book,
                reason: format!("isbn {} already exists", book.isbn),
            }));
        }
        books.push(book);
        Ok(())
    }

    /// Read a book directly, bypassing the trait.
    pub fn get(&self, isbn: &str) -> Option<Book> {
        self.books
            .read()
            .ok()
            .and_then(|books| books.iter().find(|b| b.isbn == isbn).cloned())
    }

    /// Get count of stored books.
    pub fn book_count(&self) -> usize {
        self.books.read().map(|books| books.len()).unwrap_or(0)
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        if let Ok(mut books) = self.books.write() {
            books.clear();
        }
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn find_by_isbn(&self, isbn: &str) -> ShelfResult<Option<Book>> {
        let books = self.books.read().map_err(|_| poisoned())?;
        Ok(books.iter().find(|b| b.isbn == isbn).cloned())
    }

    async fn find_by_author(&self, author: &str) -> ShelfResult<Vec<Book>> {
        let books = self.books.read().map_err(|_| poisoned())?;
        Ok(books.iter().filter(|b| b.author == author).cloned().collect())
    }

    async fn update(&self, book: &Book) -> ShelfResult<()> {
        let mut books = self.books.write().map_err(|_| poisoned())?;
        if let Some(row) = books.iter_mut().find(|b| b.isbn == book.isbn) {
            *row = book.clone();
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_book(isbn: &str, author: &str) -> Book {
        Book::new(isbn, format!("title{isbn}"), author, 11.1, "genre1", 11)
    }

    #[tokio::test]
    async fn test_insert_and_find_by_isbn() {
        let store = InMemoryBookStore::new();
        let book = make_book("1111", "author1");
        store.insert(book.clone()).unwrap();

        assert_eq!(store.find_by_isbn("1111").await.unwrap(), Some(book));
        assert_eq!(store.find_by_isbn("2222").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_by_author_preserves_insertion_order() {
        let store = InMemoryBookStore::with_books([
            make_book("3333", "author1"),
            make_book("2222", "author2"),
            make_book("1111", "author1"),
        ])
        .unwrap();

        let books = store.find_by_author("author1").await.unwrap();
        let isbns: Vec<&str> = books.iter().map(|b| b.isbn.as_str()).collect();
        assert_eq!(isbns, vec!["3333", "1111"]);
    }

    #[tokio::test]
    async fn test_update_replaces_row() {
        let store = InMemoryBookStore::with_books([make_book("1111", "author1")]).unwrap();
        let mut changed = make_book("1111", "author1");
        changed.quantity = 5;

        store.update(&changed).await.unwrap();
        assert_eq!(store.get("1111"), Some(changed));
        assert_eq!(store.book_count(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_isbn_matches_nothing() {
        let store = InMemoryBookStore::with_books([make_book("2222", "author2")]).unwrap();
        store.update(&make_book("1111", "author1")).await.unwrap();

        assert_eq!(store.get("1111"), None);
        assert_eq!(store.book_count(), 1);
    }

    #[tokio::test]
    async fn test_poisoned_lock_is_store_unavailable() {
        let store = InMemoryBookStore::with_books([make_book("1111", "author1")]).unwrap();
        let books = Arc::clone(&store.books);
        let panicked = std::thread::spawn(move || {
            let _guard = books.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(panicked.is_err());

        for result in [
            store.update(&make_book("1111", "author1")).await,
            store.find_by_isbn("1111").await.map(|_| ()),
            store.find_by_author("author1").await.map(|_| ()),
        ] {
            let err = result.unwrap_err();
            assert!(err.is_tier_unavailable());
            assert!(matches!(
                err,
                ShelfError::Cache(shelf_core::CacheError::TierUnavailable {
                    tier: Tier::Store,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let store = InMemoryBookStore::new();
        store.insert(make_book("1111", "author1")).unwrap();
        assert!(store.insert(make_book("1111", "author1")).is_err());

        store.clear();
        assert_eq!(store.book_count(), 0);
    }

    #[tokio::test]
    async fn test_default_lifecycle_hooks_succeed() {
        let store = InMemoryBookStore::new();
        store.start_up().await.unwrap();
        store.shut_down().await.unwrap();
    }
}
