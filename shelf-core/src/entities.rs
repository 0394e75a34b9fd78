//! Core entity structures

use serde::{Deserialize, Serialize};

/// Book record, the unit of versioning across all tiers.
///
/// `isbn` is the primary key; `author` is the non-unique grouping attribute
/// used by per-author reports. Equality compares every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub price: f64,
    pub category: String,
    pub quantity: u32,
}

impl Book {
    pub fn new(
        isbn: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        price: f64,
        category: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            isbn: isbn.into(),
            title: title.into(),
            author: author.into(),
            price,
            category: category.into(),
            quantity,
        }
    }

    /// Catalog value of the copies on hand.
    pub fn stock_value(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// One line of an author report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSummary {
    pub title: String,
    pub isbn: String,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            isbn: book.isbn.clone(),
        }
    }
}

/// Derived per-author summary.
///
/// Serialized as `{"books":[{"title":..,"isbn":..}],"value":..}`; the field
/// order is part of the cached format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorReport {
    pub books: Vec<BookSummary>,
    pub value: f64,
}

impl AuthorReport {
    /// Number of books covered by this report.
    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
