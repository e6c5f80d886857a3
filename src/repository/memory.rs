//! Process-local book store, selected with `database.url = "memory://"`

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BookFilter, BookStore, Pagination, DUPLICATE_BOOK_MESSAGE};
use crate::{
    error::{AppError, AppResult},
    models::{Book, NewBook},
};

#[derive(Default)]
struct State {
    rows: Vec<Book>,
    last_id: i32,
}

impl State {
    /// Same rule as the unique index on (LOWER(titulo), LOWER(autor))
    fn ensure_unique(&self, titulo: &str, autor: &str, except_id: Option<i32>) -> AppResult<()> {
        let titulo = titulo.to_lowercase();
        let autor = autor.to_lowercase();
        let taken = self.rows.iter().any(|row| {
            Some(row.id) != except_id
                && row.titulo.to_lowercase() == titulo
                && row.autor.to_lowercase() == autor
        });
        if taken {
            return Err(AppError::Conflict(DUPLICATE_BOOK_MESSAGE.to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBookStore {
    state: RwLock<State>,
}

impl InMemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn insert(&self, book: &NewBook) -> AppResult<Book> {
        let mut state = self.state.write().await;
        state.ensure_unique(&book.titulo, &book.autor, None)?;

        state.last_id += 1;
        let row = Book {
            id: state.last_id,
            titulo: book.titulo.clone(),
            autor: book.autor.clone(),
            isbn: book.isbn.clone(),
            anio_publicacion: book.anio_publicacion,
            categoria: book.categoria,
            stock: book.stock,
            creado_en: book.created_at,
            actualizado_en: book.created_at,
        };
        state.rows.push(row.clone());
        Ok(row)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let state = self.state.read().await;
        Ok(state.rows.iter().find(|row| row.id == id).cloned())
    }

    async fn find_by_title_and_author(&self, titulo: &str, autor: &str) -> AppResult<Option<Book>> {
        let titulo = titulo.to_lowercase();
        let autor = autor.to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .rows
            .iter()
            .find(|row| row.titulo.to_lowercase() == titulo && row.autor.to_lowercase() == autor)
            .cloned())
    }

    async fn query(&self, filter: &BookFilter, pagination: Pagination) -> AppResult<(Vec<Book>, i64)> {
        let predicates = filter.predicates();
        let state = self.state.read().await;

        let mut matching: Vec<&Book> = state
            .rows
            .iter()
            .filter(|row| predicates.iter().all(|p| p.matches(row)))
            .collect();
        matching.sort_by(|a, b| {
            b.creado_en
                .cmp(&a.creado_en)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as i64;
        let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(pagination.limit).unwrap_or(0);
        let page = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn update(&self, book: &Book) -> AppResult<Option<Book>> {
        let mut state = self.state.write().await;
        state.ensure_unique(&book.titulo, &book.autor, Some(book.id))?;

        let Some(row) = state.rows.iter_mut().find(|row| row.id == book.id) else {
            return Ok(None);
        };
        // creado_en is immutable
        *row = Book {
            creado_en: row.creado_en,
            ..book.clone()
        };
        Ok(Some(row.clone()))
    }

    async fn delete_by_id(&self, id: i32) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let before = state.rows.len();
        state.rows.retain(|row| row.id != id);
        Ok((before - state.rows.len()) as u64)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
