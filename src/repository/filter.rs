//! List filters as a conjunction of predicate clauses.

use crate::models::{Book, BookQuery, Category};

/// Single filter clause. A listing keeps rows matching every clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookPredicate {
    /// Case-insensitive substring of titulo or autor (term is lowercased)
    Search(String),
    Category(Category),
    YearFrom(i32),
    YearTo(i32),
    InStock,
}

impl BookPredicate {
    /// Evaluate the clause against a stored row
    pub fn matches(&self, book: &Book) -> bool {
        match self {
            BookPredicate::Search(term) => {
                book.titulo.to_lowercase().contains(term.as_str())
                    || book.autor.to_lowercase().contains(term.as_str())
            }
            BookPredicate::Category(category) => book.categoria == Some(*category),
            BookPredicate::YearFrom(year) => book.anio_publicacion.is_some_and(|y| y >= *year),
            BookPredicate::YearTo(year) => book.anio_publicacion.is_some_and(|y| y <= *year),
            BookPredicate::InStock => book.stock > 0,
        }
    }
}

/// Filter inputs of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub search: Option<String>,
    pub categoria: Option<Category>,
    pub anio_desde: Option<i32>,
    pub anio_hasta: Option<i32>,
    pub in_stock_only: bool,
}

impl BookFilter {
    /// One clause per provided input, in a fixed order
    pub fn predicates(&self) -> Vec<BookPredicate> {
        let mut predicates = Vec::new();

        if let Some(ref term) = self.search {
            if !term.is_empty() {
                predicates.push(BookPredicate::Search(term.to_lowercase()));
            }
        }
        if let Some(category) = self.categoria {
            predicates.push(BookPredicate::Category(category));
        }
        if let Some(year) = self.anio_desde {
            predicates.push(BookPredicate::YearFrom(year));
        }
        if let Some(year) = self.anio_hasta {
            predicates.push(BookPredicate::YearTo(year));
        }
        if self.in_stock_only {
            predicates.push(BookPredicate::InStock);
        }

        predicates
    }
}

impl From<&BookQuery> for BookFilter {
    fn from(query: &BookQuery) -> Self {
        Self {
            search: query.q.clone(),
            categoria: query.categoria,
            anio_desde: query.anio_desde,
            anio_hasta: query.anio_hasta,
            in_stock_only: query.in_stock_only(),
        }
    }
}

/// Page window; `page` starts at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Rows to skip. Saturates so an oversized page lands past the last row.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl From<&BookQuery> for Pagination {
    fn from(query: &BookQuery) -> Self {
        Self {
            page: query.page(),
            limit: query.limit(),
        }
    }
}
