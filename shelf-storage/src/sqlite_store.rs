//! SQLite book store (via rusqlite).
//!
//! A single `books` table mapped one-to-one onto [`Book`]. `find_by_author`
//! returns rows in insertion (rowid) order, which is the order group indexes
//! and composite keys are built in.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use shelf_core::{
    Book, CoherenceConfig, ConfigError, EntityType, ShelfError, ShelfResult, StorageError, Tier,
};

use crate::BookStore;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS books (
    isbn     TEXT PRIMARY KEY,
    title    TEXT NOT NULL,
    author   TEXT NOT NULL,
    price    REAL NOT NULL,
    category TEXT NOT NULL,
    quantity INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_books_author ON books(author);";

fn unavailable(context: &str, e: rusqlite::Error) -> ShelfError {
    ShelfError::tier_unavailable(Tier::Store, format!("{context}: {e}"))
}

fn poisoned() -> ShelfError {
    ShelfError::tier_unavailable(Tier::Store, "SQLite connection lock poisoned")
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        isbn: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        price: row.get(3)?,
        category: row.get(4)?,
        quantity: row.get(5)?,
    })
}

/// Book store backed by one SQLite connection.
pub struct SqliteBookStore {
    conn: Mutex<Connection>,
}

impl SqliteBookStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> ShelfResult<Self> {
        let conn = Connection::open(path).map_err(|e| unavailable("SQLite open", e))?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> ShelfResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| unavailable("SQLite open", e))?;
        Self::with_connection(conn)
    }

    /// Open the database named by `config.sqlite_path`.
    pub fn from_config(config: &CoherenceConfig) -> ShelfResult<Self> {
        let path = config.sqlite_path.as_ref().ok_or_else(|| ConfigError::MissingRequired {
            field: "sqlite_path".to_string(),
        })?;
        Self::open(path)
    }

    fn with_connection(conn: Connection) -> ShelfResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| unavailable("create books", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new book. Fails if the isbn already exists.
    pub fn insert(&self, book: &Book) -> ShelfResult<()> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        conn.execute(
            "INSERT INTO books (isbn, title, author, price, category, quantity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                book.isbn,
                book.title,
                book.author,
                book.price,
                book.category,
                book.quantity
            ],
        )
        .map_err(|e| StorageError::InsertFailed {
            entity_type: EntityType::Book,
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Number of rows in the table.
    pub fn count(&self) -> ShelfResult<u64> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
            .map_err(|e| unavailable("count", e))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl BookStore for SqliteBookStore {
    async fn shut_down(&self) -> ShelfResult<()> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        conn.execute_batch("PRAGMA optimize;")
            .map_err(|e| unavailable("shut down", e))
    }

    async fn find_by_isbn(&self, isbn: &str) -> ShelfResult<Option<Book>> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT isbn, title, author, price, category, quantity
                 FROM books WHERE isbn = ?1",
            )
            .map_err(|e| unavailable("prepare find_by_isbn", e))?;
        let book = stmt
            .query_row(params![isbn], book_from_row)
            .optional()
            .map_err(|e| unavailable("find_by_isbn", e))?;
        Ok(book)
    }

    async fn find_by_author(&self, author: &str) -> ShelfResult<Vec<Book>> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT isbn, title, author, price, category, quantity
                 FROM books WHERE author = ?1 ORDER BY rowid",
            )
            .map_err(|e| unavailable("prepare find_by_author", e))?;
        let rows = stmt
            .query_map(params![author], book_from_row)
            .map_err(|e| unavailable("find_by_author", e))?;
        let books = rows
            .collect::<rusqlite::Result<Vec<Book>>>()
            .map_err(|e| unavailable("find_by_author", e))?;
        Ok(books)
    }

    async fn update(&self, book: &Book) -> ShelfResult<()> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let changed = conn
            .execute(
                "UPDATE books
                 SET author = ?2, title = ?3, category = ?4, price = ?5, quantity = ?6
                 WHERE isbn = ?1",
                params![
                    book.isbn,
                    book.author,
                    book.title,
                    book.category,
                    book.price,
                    book.quantity
                ],
            )
            .map_err(|e| unavailable("update", e))?;
        if changed == 0 {
            tracing::debug!(isbn = %book.isbn, "update matched no row");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn book(isbn: &str, author: &str, quantity: u32) -> Book {
        Book::new(isbn, format!("title{isbn}"), author, 11.1, "genre1", quantity)
    }

    #[tokio::test]
    async fn test_insert_and_find_by_isbn() {
        let store = SqliteBookStore::open_in_memory().unwrap();
        let b = book("1111", "author1", 11);
        store.insert(&b).unwrap();

        assert_eq!(store.find_by_isbn("1111").await.unwrap(), Some(b));
        assert_eq!(store.find_by_isbn("9999").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_by_author_keeps_insertion_order() {
        let store = SqliteBookStore::open_in_memory().unwrap();
        store.insert(&book("3333", "author1", 1)).unwrap();
        store.insert(&book("2222", "author2", 1)).unwrap();
        store.insert(&book("1111", "author1", 1)).unwrap();

        let isbns: Vec<String> = store
            .find_by_author("author1")
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.isbn)
            .collect();
        assert_eq!(isbns, vec!["3333", "1111"]);
        assert!(store.find_by_author("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_overwrites_row() {
        let store = SqliteBookStore::open_in_memory().unwrap();
        store.insert(&book("1111", "author1", 11)).unwrap();

        let mut changed = book("1111", "author1", 5);
        changed.price = 9.5;
        store.update(&changed).await.unwrap();

        assert_eq!(store.find_by_isbn("1111").await.unwrap(), Some(changed));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_isbn_matches_nothing() {
        let store = SqliteBookStore::open_in_memory().unwrap();
        store.insert(&book("2222", "author2", 1)).unwrap();

        store.update(&book("1111", "author1", 1)).await.unwrap();
        assert_eq!(store.find_by_isbn("1111").await.unwrap(), None);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_update_is_store_unavailable() {
        let store = SqliteBookStore::open_in_memory().unwrap();
        store.insert(&book("1111", "author1", 1)).unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute_batch("DROP TABLE books;")
            .unwrap();

        let err = store.update(&book("1111", "author1", 2)).await.unwrap_err();
        assert!(matches!(
            err,
            ShelfError::Cache(shelf_core::CacheError::TierUnavailable {
                tier: Tier::Store,
                ..
            })
        ));
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let store = SqliteBookStore::open_in_memory().unwrap();
        store.insert(&book("1111", "author1", 1)).unwrap();
        assert!(store.insert(&book("1111", "author1", 1)).is_err());
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("books.sqlite3");
        {
            let store = SqliteBookStore::open(&path).unwrap();
            store.insert(&book("1111", "author1", 11)).unwrap();
            store.shut_down().await.unwrap();
        }
        let config = CoherenceConfig::new().with_sqlite_path(&path);
        let reopened = SqliteBookStore::from_config(&config).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
