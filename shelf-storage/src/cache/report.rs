//! Author report computation.

use shelf_core::{AuthorReport, Book, BookSummary};

/// Compute the report for `books`, keeping their order.
///
/// `value` is the sum of `price × quantity`, accumulated in member order.
pub fn compute_author_report(books: &[Book]) -> AuthorReport {
    AuthorReport {
        books: books.iter().map(BookSummary::from).collect(),
        value: books.iter().fold(0.0, |value, book| value + book.stock_value()),
    }
}
