//! Typed ledger operations.
//!
//! Each operation the bridge knows about is a variant of [`OperationRequest`].
//! The ledger still receives positional string arguments; the variants only
//! fix the operation name, its mode and the order of its arguments.

use serde::{Deserialize, Serialize};

/// Whether an operation reads current state or proposes a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Evaluated against current state; nothing is committed.
    Read,
    /// Endorsed, ordered and committed.
    Write,
}

impl Mode {
    /// Returns `"read"` or `"write"`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A book record as registered on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct Book {
    /// Title of the book.
    pub book_name: String,
    /// Author of the book.
    pub author: String,
    /// Publisher of the book.
    pub publisher: String,
    /// Location (city/region) holding the copy.
    pub location: String,
    /// Library holding the copy.
    pub library: String,
}

/// A request to run one named operation on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    /// Looks up all copies of a book at a location (`queryBook`).
    QueryBook {
        /// Title to look up.
        book_name: String,
        /// Location to look in.
        location: String,
    },
    /// Registers a copy of a book (`createBook`).
    CreateBook(Book),
}

impl OperationRequest {
    /// Creates a `queryBook` request.
    #[must_use]
    pub fn query_book(book_name: impl Into<String>, location: impl Into<String>) -> Self {
        Self::QueryBook { book_name: book_name.into(), location: location.into() }
    }

    /// Creates a `createBook` request.
    #[must_use]
    pub fn create_book(book: Book) -> Self {
        Self::CreateBook(book)
    }

    /// Returns the operation name as known to the ledger.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::QueryBook { .. } => "queryBook",
            Self::CreateBook(_) => "createBook",
        }
    }

    /// Returns whether the operation reads or writes.
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self {
            Self::QueryBook { .. } => Mode::Read,
            Self::CreateBook(_) => Mode::Write,
        }
    }

    /// Returns the positional arguments in the order the ledger expects.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::QueryBook { book_name, location } => vec![book_name.clone(), location.clone()],
            Self::CreateBook(book) => vec![
                book.book_name.clone(),
                book.author.clone(),
                book.publisher.clone(),
                book.location.clone(),
                book.library.clone(),
            ],
        }
    }
}
