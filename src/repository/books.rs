//! PostgreSQL book store

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder};

use super::{BookFilter, BookPredicate, BookStore, Pagination, DUPLICATE_BOOK_MESSAGE};
use crate::{
    error::{AppError, AppResult},
    models::{Book, NewBook},
};

const BOOK_COLUMNS: &str =
    "id, titulo, autor, isbn, anio_publicacion, categoria, stock, creado_en, actualizado_en";

/// Maps the unique index violation on (LOWER(titulo), LOWER(autor)) to a conflict
fn map_write_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return AppError::Conflict(DUPLICATE_BOOK_MESSAGE.to_string());
        }
    }
    AppError::Database(e)
}

/// Escape LIKE wildcards so the search term matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Append the predicates as a WHERE conjunction
fn push_predicates(builder: &mut QueryBuilder<'_, Postgres>, predicates: Vec<BookPredicate>) {
    for (i, predicate) in predicates.into_iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        match predicate {
            BookPredicate::Search(term) => {
                let pattern = format!("%{}%", escape_like(&term));
                builder
                    .push("(LOWER(titulo) LIKE ")
                    .push_bind(pattern.clone())
                    .push(" ESCAPE '\\' OR LOWER(autor) LIKE ")
                    .push_bind(pattern)
                    .push(" ESCAPE '\\')");
            }
            BookPredicate::Category(category) => {
                builder.push("categoria = ").push_bind(category);
            }
            BookPredicate::YearFrom(year) => {
                builder.push("anio_publicacion >= ").push_bind(year);
            }
            BookPredicate::YearTo(year) => {
                builder.push("anio_publicacion <= ").push_bind(year);
            }
            BookPredicate::InStock => {
                builder.push("stock > 0");
            }
        }
    }
}

#[derive(Clone)]
pub struct PgBookStore {
    pool: Pool<Postgres>,
}

impl PgBookStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for PgBookStore {
    async fn insert(&self, book: &NewBook) -> AppResult<Book> {
        let query = format!(
            r#"
            INSERT INTO books (titulo, autor, isbn, anio_publicacion, categoria, stock, creado_en, actualizado_en)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        );

        sqlx::query_as::<_, Book>(&query)
            .bind(&book.titulo)
            .bind(&book.autor)
            .bind(&book.isbn)
            .bind(book.anio_publicacion)
            .bind(book.categoria)
            .bind(book.stock)
            .bind(book.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let query = format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS);
        let book = sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn find_by_title_and_author(&self, titulo: &str, autor: &str) -> AppResult<Option<Book>> {
        let query = format!(
            "SELECT {} FROM books WHERE LOWER(titulo) = LOWER($1) AND LOWER(autor) = LOWER($2) LIMIT 1",
            BOOK_COLUMNS
        );
        let book = sqlx::query_as::<_, Book>(&query)
            .bind(titulo)
            .bind(autor)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn query(&self, filter: &BookFilter, pagination: Pagination) -> AppResult<(Vec<Book>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books");
        push_predicates(&mut count, filter.predicates());
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM books", BOOK_COLUMNS));
        push_predicates(&mut select, filter.predicates());
        select
            .push(" ORDER BY creado_en DESC, id DESC LIMIT ")
            .push_bind(pagination.limit)
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let books = select.build_query_as::<Book>().fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    async fn update(&self, book: &Book) -> AppResult<Option<Book>> {
        let query = format!(
            r#"
            UPDATE books SET
                titulo = $2,
                autor = $3,
                isbn = $4,
                anio_publicacion = $5,
                categoria = $6,
                stock = $7,
                actualizado_en = $8
            WHERE id = $1
            RETURNING {}
            "#,
            BOOK_COLUMNS
        );

        sqlx::query_as::<_, Book>(&query)
            .bind(book.id)
            .bind(&book.titulo)
            .bind(&book.autor)
            .bind(&book.isbn)
            .bind(book.anio_publicacion)
            .bind(book.categoria)
            .bind(book.stock)
            .bind(book.actualizado_en)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)
    }

    async fn delete_by_id(&self, id: i32) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
