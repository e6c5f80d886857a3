//! Book model and request/response shapes.
//!
//! JSON field names follow the catalog vocabulary (`titulo`, `autor`,
//! `anioPublicacion`, ...). Column names are the snake_case equivalents.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    Decode, Encode, FromRow, Postgres, Type,
};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

/// Earliest accepted publication year
pub const MIN_PUBLICATION_YEAR: i32 = 1450;

/// Default page size when `limit` is omitted
pub const DEFAULT_LIMIT: i64 = 10;

/// Book category.
///
/// Serialized with the catalog codes (`ficcion`, `no_ficcion`, ...); the
/// English names are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Category {
    #[serde(rename = "ficcion", alias = "fiction")]
    Fiction,
    #[serde(rename = "no_ficcion", alias = "non_fiction")]
    NonFiction,
    #[serde(rename = "tecnico", alias = "technical")]
    Technical,
    #[serde(rename = "academico", alias = "academic")]
    Academic,
    #[serde(rename = "infantil", alias = "children")]
    Children,
}

impl Category {
    /// Storage and wire code
    pub fn as_code(&self) -> &'static str {
        match self {
            Category::Fiction => "ficcion",
            Category::NonFiction => "no_ficcion",
            Category::Technical => "tecnico",
            Category::Academic => "academico",
            Category::Children => "infantil",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ficcion" | "fiction" => Ok(Category::Fiction),
            "no_ficcion" | "non_fiction" => Ok(Category::NonFiction),
            "tecnico" | "technical" => Ok(Category::Technical),
            "academico" | "academic" => Ok(Category::Academic),
            "infantil" | "children" => Ok(Category::Children),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

// Stored as plain TEXT holding the category code.
impl Type<Postgres> for Category {
    fn type_info() -> PgTypeInfo {
        <&str as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <&str as Type<Postgres>>::compatible(ty)
    }
}

impl<'q> Encode<'q, Postgres> for Category {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> IsNull {
        <&str as Encode<'q, Postgres>>::encode(self.as_code(), buf)
    }
}

impl<'r> Decode<'r, Postgres> for Category {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let code = <&str as Decode<'r, Postgres>>::decode(value)?;
        Ok(code.parse::<Category>()?)
    }
}

/// Stored book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i32,
    pub titulo: String,
    pub autor: String,
    /// ISBN-10 or ISBN-13, as supplied (hyphens and spaces preserved)
    pub isbn: Option<String>,
    pub anio_publicacion: Option<i32>,
    pub categoria: Option<Category>,
    pub stock: i32,
    pub creado_en: DateTime<Utc>,
    pub actualizado_en: DateTime<Utc>,
}

impl Book {
    /// Apply the fields present in `changes`; absent fields keep their value
    /// and an explicit `null` clears an optional column.
    pub fn apply(&mut self, changes: UpdateBook) {
        let UpdateBook {
            titulo,
            autor,
            isbn,
            anio_publicacion,
            categoria,
            stock,
        } = changes;

        if let Some(titulo) = titulo {
            self.titulo = titulo;
        }
        if let Some(autor) = autor {
            self.autor = autor;
        }
        if let Some(isbn) = isbn {
            self.isbn = isbn;
        }
        if let Some(anio_publicacion) = anio_publicacion {
            self.anio_publicacion = anio_publicacion;
        }
        if let Some(categoria) = categoria {
            self.categoria = categoria;
        }
        if let Some(stock) = stock {
            self.stock = stock;
        }
    }
}

/// Row to insert, already validated
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub titulo: String,
    pub autor: String,
    pub isbn: Option<String>,
    pub anio_publicacion: Option<i32>,
    pub categoria: Option<Category>,
    pub stock: i32,
    /// Used for both `creado_en` and `actualizado_en`
    pub created_at: DateTime<Utc>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 3, max = 150, message = "titulo must be between 3 and 150 characters"))]
    pub titulo: String,
    #[validate(length(min = 3, max = 120, message = "autor must be between 3 and 120 characters"))]
    pub autor: String,
    pub isbn: Option<String>,
    pub anio_publicacion: Option<i32>,
    pub categoria: Option<Category>,
    /// Defaults to 0
    pub stock: Option<i32>,
}

/// Partial update request. Omitted fields are left untouched.
///
/// `isbn`, `anioPublicacion` and `categoria` distinguish an omitted field
/// (`None`) from an explicit `null` (`Some(None)`), which clears the column.
/// `null` on the required fields is the same as omitting them.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(length(min = 3, max = 150, message = "titulo must be between 3 and 150 characters"))]
    pub titulo: Option<String>,
    #[validate(length(min = 3, max = 120, message = "autor must be between 3 and 120 characters"))]
    pub autor: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub isbn: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<i32>, nullable)]
    pub anio_publicacion: Option<Option<i32>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<Category>, nullable)]
    pub categoria: Option<Option<Category>>,
    pub stock: Option<i32>,
}

/// Book list query parameters
#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
#[validate(schema(function = "validate_book_query"))]
pub struct BookQuery {
    /// Case-insensitive search in titulo or autor
    pub q: Option<String>,
    pub categoria: Option<Category>,
    /// Inclusive lower bound on anioPublicacion
    #[validate(range(min = 1450, message = "anioDesde must be at least 1450"))]
    pub anio_desde: Option<i32>,
    /// Inclusive upper bound on anioPublicacion
    pub anio_hasta: Option<i32>,
    /// Page number (default: 1)
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: Option<i64>,
    /// Page size, 1-100 (default: 10)
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<i64>,
    /// `true`/`1` keeps only books with stock > 0
    pub con_stock: Option<String>,
}

impl BookQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    /// `conStock=true` or `conStock=1`
    pub fn in_stock_only(&self) -> bool {
        matches!(self.con_stock.as_deref(), Some("true") | Some("1"))
    }
}

fn validate_book_query(query: &BookQuery) -> Result<(), ValidationError> {
    if let Some(hasta) = query.anio_hasta {
        let year = crate::services::books::current_year();
        if hasta > year {
            let mut err = ValidationError::new("range");
            err.message = Some(format!("anioHasta must not be after {}", year).into());
            return Err(err);
        }
    }
    if let Some(ref flag) = query.con_stock {
        if !matches!(flag.as_str(), "true" | "false" | "1" | "0") {
            let mut err = ValidationError::new("boolean");
            err.message = Some("conStock must be one of true, false, 1, 0".into());
            return Err(err);
        }
    }
    Ok(())
}

/// One page of books plus the total number of matches
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookPage {
    pub data: Vec<Book>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}
