//! Repository layer for book persistence

pub mod books;
pub mod filter;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{Book, NewBook},
};

pub use filter::{BookFilter, BookPredicate, Pagination};

/// Message used when the storage layer reports a (titulo, autor) clash
pub const DUPLICATE_BOOK_MESSAGE: &str = "A book with the same titulo and autor already exists";

/// Record store for book rows.
///
/// Implementations must reject a row whose case-insensitive (titulo, autor)
/// pair is already taken by another row with `AppError::Conflict`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Persist a new row and return it with its generated id
    async fn insert(&self, book: &NewBook) -> AppResult<Book>;

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Book>>;

    /// Case-insensitive lookup on the (titulo, autor) pair
    async fn find_by_title_and_author(&self, titulo: &str, autor: &str) -> AppResult<Option<Book>>;

    /// Matching rows for the page, newest first, and the total match count
    async fn query(&self, filter: &BookFilter, pagination: Pagination) -> AppResult<(Vec<Book>, i64)>;

    /// Overwrite every mutable column of `book.id`. `None` when the row is gone.
    async fn update(&self, book: &Book) -> AppResult<Option<Book>>;

    /// Number of rows removed
    async fn delete_by_id(&self, id: i32) -> AppResult<u64>;

    /// Connectivity check for readiness probes
    async fn ping(&self) -> AppResult<()>;
}

/// Process-wide store handle
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookStore>,
}

impl Repository {
    /// Create a PostgreSQL-backed repository with the given pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self::with_store(Arc::new(books::PgBookStore::new(pool)))
    }

    /// Repository over the process-local store
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(memory::InMemoryBookStore::new()))
    }

    pub fn with_store(books: Arc<dyn BookStore>) -> Self {
        Self { books }
    }
}
