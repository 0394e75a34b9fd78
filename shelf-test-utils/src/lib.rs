//! SHELF Test Utilities
//!
//! Centralized test infrastructure for the SHELF workspace:
//! - Proptest generators for books and catalogues
//! - Fixtures for the reference catalogue and in-memory coordinators
//! - Custom assertions for tier-specific errors
//! - Tracing initialisation for tests

// Re-export in-memory tiers from their source crate
pub use shelf_storage::{
    BookStore, CoherenceCoordinator, InMemoryBookStore, InMemoryLocalCache, InMemoryRemoteCache,
    LocalCache, LocalEntry, ReadSource, RemoteCache, TierOp, TierRead,
};

// Re-export core types for convenience
pub use shelf_core::{
    AuthorReport, Book, BookSummary, CacheError, CoherenceConfig, EntityType, ShelfError,
    ShelfResult, StorageError, Tier, Version,
};

use tracing_subscriber::EnvFilter;

/// Coordinator wired to the in-memory tiers.
pub type InMemoryCoordinator =
    CoherenceCoordinator<InMemoryBookStore, InMemoryRemoteCache, InMemoryLocalCache>;

/// Install a fmt subscriber that writes through the test harness.
///
/// Filtering follows `RUST_LOG`. Safe to call from every test; only the
/// first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest generators for books and catalogues.

    use super::*;
    use proptest::collection::{btree_set, vec};
    use proptest::prelude::*;

    /// Generate an isbn: digits only, so it never contains the key separator.
    pub fn arb_isbn() -> impl Strategy<Value = String> {
        "[0-9]{4,13}"
    }

    /// Generate an author name.
    pub fn arb_author() -> impl Strategy<Value = String> {
        "author[0-9]{1,2}"
    }

    /// Generate a price in cents-precision.
    pub fn arb_price() -> impl Strategy<Value = f64> {
        (0u32..100_000).prop_map(|cents| f64::from(cents) / 100.0)
    }

    /// Generate a book with the given isbn and author.
    pub fn arb_book_for(isbn: String, author: String) -> impl Strategy<Value = Book> {
        ("[a-z ]{1,24}", arb_price(), "genre[0-9]", 0u32..500).prop_map(
            move |(title, price, category, quantity)| Book {
                isbn: isbn.clone(),
                title,
                author: author.clone(),
                price,
                category,
                quantity,
            },
        )
    }

    /// Generate any book.
    pub fn arb_book() -> impl Strategy<Value = Book> {
        (arb_isbn(), arb_author()).prop_flat_map(|(isbn, author)| arb_book_for(isbn, author))
    }

    /// Generate a catalogue of books with distinct isbns.
    pub fn arb_catalogue(max_len: usize) -> impl Strategy<Value = Vec<Book>> {
        (btree_set(arb_isbn(), 1..=max_len.max(1)), vec(arb_author(), max_len.max(1)))
            .prop_flat_map(|(isbns, authors)| {
                isbns
                    .into_iter()
                    .zip(authors.into_iter().cycle())
                    .map(|(isbn, author)| arb_book_for(isbn, author))
                    .collect::<Vec<_>>()
            })
    }

    /// Generate a book together with a sequence of edits to it.
    pub fn arb_book_with_edits(max_edits: usize) -> impl Strategy<Value = (Book, Vec<Book>)> {
        arb_book().prop_flat_map(move |book| {
            let edits = vec(
                arb_book_for(book.isbn.clone(), book.author.clone()),
                0..=max_edits,
            );
            (Just(book), edits)
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use std::sync::Arc;

    pub fn book1() -> Book {
        Book::new("1111", "title1", "author1", 11.1, "genre1", 11)
    }

    pub fn book2() -> Book {
        Book::new("2222", "title2", "author2", 22.2, "genre1", 22)
    }

    pub fn book3() -> Book {
        Book::new("3333", "title3", "author1", 11.1, "genre1", 11)
    }

    pub fn book4() -> Book {
        Book::new("4444", "title4", "author2", 22.2, "genre1", 22)
    }

    /// The reference catalogue, in store order.
    pub fn catalogue() -> Vec<Book> {
        vec![book1(), book2(), book3(), book4()]
    }

    /// In-memory store holding `books` in order.
    pub fn store_with(books: impl IntoIterator<Item = Book>) -> InMemoryBookStore {
        match InMemoryBookStore::with_books(books) {
            Ok(store) => store,
            Err(e) => panic!("fixture books must have distinct isbns: {e}"),
        }
    }

    /// Coordinator over empty in-memory caches and a store holding `books`.
    pub fn coordinator_with(books: impl IntoIterator<Item = Book>) -> InMemoryCoordinator {
        CoherenceCoordinator::with_defaults(
            Arc::new(store_with(books)),
            Arc::new(InMemoryRemoteCache::new()),
            Arc::new(InMemoryLocalCache::new()),
        )
    }

    /// A second coordinator sharing `other`'s store and remote tier, with its
    /// own empty local tier. Models another process.
    pub fn sibling(other: &InMemoryCoordinator) -> InMemoryCoordinator {
        other.sibling(Arc::new(InMemoryLocalCache::new()))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for SHELF-specific validation.

    use super::*;

    /// Assert that a ShelfResult is a NotFound storage error.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &ShelfResult<T>, entity_type: EntityType) {
        match result {
            Err(ShelfError::Storage(StorageError::NotFound { entity_type: et, .. })) => {
                assert_eq!(*et, entity_type, "Wrong entity type in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", entity_type, other),
        }
    }

    /// Assert that a ShelfResult failed because `tier` was unavailable.
    #[track_caller]
    pub fn assert_tier_unavailable<T: std::fmt::Debug>(result: &ShelfResult<T>, tier: Tier) {
        match result {
            Err(ShelfError::Cache(CacheError::TierUnavailable { tier: t, .. })) => {
                assert_eq!(*t, tier, "Wrong tier in TierUnavailable error");
            }
            other => panic!("Expected {tier} to be unavailable, got: {:?}", other),
        }
    }

    /// Assert that a ShelfResult is a CorruptCacheEntry at `key`.
    #[track_caller]
    pub fn assert_corrupt_entry<T: std::fmt::Debug>(result: &ShelfResult<T>, key: &str) {
        match result {
            Err(ShelfError::Cache(CacheError::CorruptCacheEntry { key: k, .. })) => {
                assert_eq!(k, key, "Wrong key in CorruptCacheEntry error");
            }
            other => panic!("Expected corrupt entry at {key}, got: {:?}", other),
        }
    }

    /// Assert that two report values agree to within float rounding.
    #[track_caller]
    pub fn assert_value_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "Report value {} differs from {}",
            actual,
            expected
        );
    }
}
