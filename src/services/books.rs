//! Book catalog service: every write is gated by the catalog rules here.

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::MIN_PUBLICATION_YEAR, Book, BookPage, BookQuery, CreateBook, NewBook, UpdateBook,
    },
    repository::{BookFilter, Pagination, Repository, DUPLICATE_BOOK_MESSAGE},
};

static ISBN10: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{9}[\dXx]$").expect("valid ISBN-10 regex"));
static ISBN13: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{13}$").expect("valid ISBN-13 regex"));

/// Current calendar year (UTC)
pub fn current_year() -> i32 {
    Utc::now().year()
}

/// ISBN-10 (trailing X allowed) or ISBN-13 once hyphens and spaces are removed
pub fn validate_isbn(isbn: &str) -> AppResult<()> {
    let clean: String = isbn
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();
    if ISBN10.is_match(&clean) || ISBN13.is_match(&clean) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Invalid isbn: expected ISBN-10 or ISBN-13".to_string(),
        ))
    }
}

pub fn validate_publication_year(year: i32) -> AppResult<()> {
    let now = current_year();
    if year < MIN_PUBLICATION_YEAR || year > now {
        return Err(AppError::Validation(format!(
            "anioPublicacion must be between {} and {}",
            MIN_PUBLICATION_YEAR, now
        )));
    }
    Ok(())
}

pub fn validate_stock(stock: i32) -> AppResult<()> {
    if stock < 0 {
        return Err(AppError::Validation("stock must not be negative".to_string()));
    }
    Ok(())
}

/// Checks for the fields that were provided; absent fields are not re-checked
fn validate_optional_fields(
    isbn: Option<&str>,
    anio_publicacion: Option<i32>,
    stock: Option<i32>,
) -> AppResult<()> {
    if let Some(isbn) = isbn {
        validate_isbn(isbn)?;
    }
    if let Some(year) = anio_publicacion {
        validate_publication_year(year)?;
    }
    if let Some(stock) = stock {
        validate_stock(stock)?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct BookService {
    repository: Repository,
}

impl BookService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Reject when another row (other than `editing_id`) holds the pair
    async fn ensure_unique(&self, titulo: &str, autor: &str, editing_id: Option<i32>) -> AppResult<()> {
        let existing = self
            .repository
            .books
            .find_by_title_and_author(titulo, autor)
            .await?;

        match existing {
            Some(book) if Some(book.id) != editing_id => {
                tracing::warn!(
                    "Rejected duplicate book titulo={:?} autor={:?} (existing id={})",
                    titulo,
                    autor,
                    book.id
                );
                Err(AppError::Conflict(DUPLICATE_BOOK_MESSAGE.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Create a book after uniqueness, isbn, year and stock checks
    pub async fn create(&self, data: CreateBook) -> AppResult<Book> {
        self.ensure_unique(&data.titulo, &data.autor, None).await?;
        validate_optional_fields(data.isbn.as_deref(), data.anio_publicacion, data.stock)?;

        let new_book = NewBook {
            titulo: data.titulo,
            autor: data.autor,
            isbn: data.isbn,
            anio_publicacion: data.anio_publicacion,
            categoria: data.categoria,
            stock: data.stock.unwrap_or(0),
            created_at: Utc::now(),
        };

        let book = self.repository.books.insert(&new_book).await?;
        tracing::info!("Created book id={}", book.id);
        Ok(book)
    }

    /// List books matching the query, newest first
    pub async fn find_all(&self, query: &BookQuery) -> AppResult<BookPage> {
        let filter = BookFilter::from(query);
        let pagination = Pagination::from(query);

        let (data, total) = self.repository.books.query(&filter, pagination).await?;

        Ok(BookPage {
            data,
            total,
            page: pagination.page,
            limit: pagination.limit,
        })
    }

    pub async fn find_one(&self, id: i32) -> AppResult<Book> {
        self.repository
            .books
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    /// Apply a partial update. Only provided fields are validated and changed.
    pub async fn update(&self, id: i32, changes: UpdateBook) -> AppResult<Book> {
        let mut book = self.find_one(id).await?;

        if changes.titulo.is_some() || changes.autor.is_some() {
            let titulo = changes.titulo.as_deref().unwrap_or(&book.titulo);
            let autor = changes.autor.as_deref().unwrap_or(&book.autor);
            self.ensure_unique(titulo, autor, Some(id)).await?;
        }
        // Cleared fields (explicit null) have nothing to check
        validate_optional_fields(
            changes.isbn.as_ref().and_then(|isbn| isbn.as_deref()),
            changes.anio_publicacion.flatten(),
            changes.stock,
        )?;

        book.apply(changes);
        book.actualizado_en = Utc::now();

        let updated = self
            .repository
            .books
            .update(&book)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;
        tracing::info!("Updated book id={}", id);
        Ok(updated)
    }

    /// Delete a book. A second delete of the same id is a not-found error.
    pub async fn remove(&self, id: i32) -> AppResult<()> {
        let affected = self.repository.books.delete_by_id(id).await?;
        if affected == 0 {
            return Err(AppError::NotFound(format!("Book {} not found", id)));
        }
        tracing::info!("Deleted book id={}", id);
        Ok(())
    }

    /// Store connectivity, for readiness probes
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.books.ping().await
    }
}
