//! API integration tests, driven in-process against the in-memory store

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Datelike, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use bookshelf_server::{api::create_router, repository::Repository, services::Services, AppState};

/// Fresh application over an empty in-memory store
fn app() -> Router {
    let state = AppState {
        services: Arc::new(Services::new(Repository::in_memory())),
    };
    create_router(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).expect("Failed to build request"))
        .await
        .expect("Failed to send request");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Failed to parse response")
    };
    (status, value)
}

async fn create(app: &Router, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, "/books", Some(body)).await
}

fn clean_code() -> Value {
    json!({
        "titulo": "Clean Code",
        "autor": "Robert C. Martin",
        "isbn": "9780132350884",
        "anioPublicacion": 2008,
        "categoria": "tecnico",
        "stock": 5
    })
}

fn current_year() -> i32 {
    Utc::now().year()
}

#[tokio::test]
async fn test_health_check() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_create_book() {
    let app = app();

    let (status, body) = create(&app, clean_code()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].is_number());
    assert_eq!(body["titulo"], "Clean Code");
    assert_eq!(body["autor"], "Robert C. Martin");
    assert_eq!(body["isbn"], "9780132350884");
    assert_eq!(body["anioPublicacion"], 2008);
    assert_eq!(body["categoria"], "tecnico");
    assert_eq!(body["stock"], 5);
    assert_eq!(body["creadoEn"], body["actualizadoEn"]);
}

#[tokio::test]
async fn test_created_ids_are_distinct() {
    let app = app();

    let (_, first) = create(&app, json!({ "titulo": "Dune", "autor": "Frank Herbert" })).await;
    let (_, second) = create(&app, json!({ "titulo": "Emma", "autor": "Jane Austen" })).await;
    assert_ne!(first["id"], second["id"]);
    assert_eq!(first["stock"], 0);
    assert_eq!(first["isbn"], Value::Null);
}

#[tokio::test]
async fn test_duplicate_title_and_author_any_case() {
    let app = app();

    let (status, _) = create(&app, clean_code()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = create(
        &app,
        json!({ "titulo": "CLEAN code", "autor": "robert c. martin" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Duplicate");

    let (_, list) = send(&app, Method::GET, "/books", None).await;
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn test_duplicate_is_reported_before_field_errors() {
    let app = app();
    create(&app, clean_code()).await;

    let (status, _) = create(
        &app,
        json!({ "titulo": "Clean Code", "autor": "Robert C. Martin", "isbn": "123" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_isbn_validation() {
    let app = app();

    for (i, isbn) in ["9780132350884", "0132350882", "013235088X"].iter().enumerate() {
        let (status, _) = create(
            &app,
            json!({ "titulo": format!("Book {}", i), "autor": "Some Author", "isbn": isbn }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "isbn {}", isbn);
    }

    let (status, body) = create(
        &app,
        json!({ "titulo": "Bad Isbn", "autor": "Some Author", "isbn": "123" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("isbn"));
}

#[tokio::test]
async fn test_publication_year_bounds() {
    let app = app();
    let year = current_year();

    for (titulo, anio, expected) in [
        ("Year 1449", 1449, StatusCode::BAD_REQUEST),
        ("Year 1450", 1450, StatusCode::CREATED),
        ("This Year", year, StatusCode::CREATED),
        ("Next Year", year + 1, StatusCode::BAD_REQUEST),
    ] {
        let (status, _) = create(
            &app,
            json!({ "titulo": titulo, "autor": "Some Author", "anioPublicacion": anio }),
        )
        .await;
        assert_eq!(status, expected, "anioPublicacion {}", anio);
    }
}

#[tokio::test]
async fn test_stock_bounds() {
    let app = app();

    let (status, _) = create(
        &app,
        json!({ "titulo": "Negative", "autor": "Some Author", "stock": -1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = create(
        &app,
        json!({ "titulo": "Zero Stock", "autor": "Some Author", "stock": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["stock"], 0);
}

#[tokio::test]
async fn test_create_rejects_malformed_bodies() {
    let app = app();

    for body in [
        json!({ "titulo": "ab", "autor": "Some Author" }),
        json!({ "titulo": "x".repeat(151), "autor": "Some Author" }),
        json!({ "titulo": "Missing Author" }),
        json!({ "titulo": "Bad Category", "autor": "Some Author", "categoria": "poesia" }),
        json!({ "titulo": "Bad Year", "autor": "Some Author", "anioPublicacion": "2008" }),
    ] {
        let (status, response) = create(&app, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
        assert_eq!(response["error"], "BadValue");
    }

    let (_, list) = send(&app, Method::GET, "/books", None).await;
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn test_get_book() {
    let app = app();
    let (_, created) = create(&app, clean_code()).await;
    let id = created["id"].as_i64().expect("No book ID");

    let (status, body) = send(&app, Method::GET, &format!("/books/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, created);

    let (status, body) = send(&app, Method::GET, "/books/9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchBook");

    let (status, _) = send(&app, Method::GET, "/books/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_stock_only() {
    let app = app();
    let (_, created) = create(&app, clean_code()).await;
    let id = created["id"].as_i64().expect("No book ID");
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/books/{}", id),
        Some(json!({ "stock": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 10);
    for field in ["id", "titulo", "autor", "isbn", "anioPublicacion", "categoria", "creadoEn"] {
        assert_eq!(body[field], created[field], "field {}", field);
    }
    assert_ne!(body["actualizadoEn"], created["actualizadoEn"]);
}

#[tokio::test]
async fn test_update_null_clears_optional_fields() {
    let app = app();
    let (_, created) = create(&app, clean_code()).await;
    let uri = format!("/books/{}", created["id"]);

    let (status, body) = send(&app, Method::PATCH, &uri, Some(json!({ "isbn": null }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isbn"], Value::Null);
    for field in ["titulo", "autor", "anioPublicacion", "categoria", "stock"] {
        assert_eq!(body[field], created[field], "field {}", field);
    }

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(json!({ "anioPublicacion": null, "categoria": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["anioPublicacion"], Value::Null);
    assert_eq!(body["categoria"], Value::Null);
    assert_eq!(body["stock"], 5);

    let (_, stored) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(stored, body);
}

#[tokio::test]
async fn test_update_uniqueness() {
    let app = app();
    let (_, clean) = create(&app, clean_code()).await;
    create(
        &app,
        json!({ "titulo": "Clean Architecture", "autor": "Robert C. Martin" }),
    )
    .await;
    let uri = format!("/books/{}", clean["id"]);

    // Same row, different case
    let (status, body) = send(&app, Method::PATCH, &uri, Some(json!({ "titulo": "CLEAN CODE" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["titulo"], "CLEAN CODE");

    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(json!({ "titulo": "clean architecture" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, unchanged) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(unchanged["titulo"], "CLEAN CODE");
}

#[tokio::test]
async fn test_update_errors() {
    let app = app();
    let (_, created) = create(&app, clean_code()).await;
    let uri = format!("/books/{}", created["id"]);

    let (status, _) = send(&app, Method::PATCH, "/books/9999", Some(json!({ "stock": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::PATCH, "/books/abc", Some(json!({ "stock": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for body in [
        json!({ "stock": -3 }),
        json!({ "isbn": "123" }),
        json!({ "anioPublicacion": 1000 }),
        json!({ "autor": "ab" }),
    ] {
        let (status, _) = send(&app, Method::PATCH, &uri, Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
    }

    let (_, current) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(current, created);
}

#[tokio::test]
async fn test_delete_book() {
    let app = app();
    let (_, created) = create(&app, clean_code()).await;
    let uri = format!("/books/{}", created["id"]);

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Second delete is a plain not-found
    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_missing_leaves_store_unchanged() {
    let app = app();
    create(&app, clean_code()).await;

    let (status, _) = send(&app, Method::DELETE, "/books/9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, Method::GET, "/books", None).await;
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn test_list_empty() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/books", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "data": [], "total": 0, "page": 1, "limit": 10 }));
}

#[tokio::test]
async fn test_list_pagination_and_order() {
    let app = app();
    for i in 0..15 {
        let (status, _) = create(
            &app,
            json!({ "titulo": format!("Book {:02}", i), "autor": "Some Author" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, first) = send(&app, Method::GET, "/books", None).await;
    assert_eq!(first["data"].as_array().unwrap().len(), 10);
    assert_eq!(first["data"][0]["titulo"], "Book 14");

    let (status, second) = send(&app, Method::GET, "/books?page=2&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"].as_array().unwrap().len(), 5);
    assert_eq!(second["total"], 15);
    assert_eq!(second["page"], 2);
    assert_eq!(second["limit"], 10);
    assert_eq!(second["data"][4]["titulo"], "Book 00");
}

#[tokio::test]
async fn test_list_page_past_the_end() {
    let app = app();
    create(&app, clean_code()).await;

    let (status, body) = send(&app, Method::GET, "/books?page=9223372036854775807&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], i64::MAX);
}

#[tokio::test]
async fn test_list_filters() {
    let app = app();
    for body in [
        json!({ "titulo": "The Hobbit", "autor": "J.R.R. Tolkien", "anioPublicacion": 1937, "categoria": "ficcion", "stock": 3 }),
        json!({ "titulo": "The Silmarillion", "autor": "J.R.R. Tolkien", "anioPublicacion": 1977, "categoria": "ficcion", "stock": 0 }),
        json!({ "titulo": "Clean Code", "autor": "Robert C. Martin", "anioPublicacion": 2008, "categoria": "tecnico", "stock": 5 }),
        json!({ "titulo": "Untitled Notes", "autor": "Anonymous" }),
    ] {
        create(&app, body).await;
    }

    let titles = |body: &Value| -> Vec<String> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["titulo"].as_str().unwrap().to_string())
            .collect()
    };

    let (_, body) = send(&app, Method::GET, "/books?q=tolkien", None).await;
    assert_eq!(titles(&body), vec!["The Silmarillion", "The Hobbit"]);

    let (_, body) = send(&app, Method::GET, "/books?q=CLEAN", None).await;
    assert_eq!(titles(&body), vec!["Clean Code"]);

    let (_, body) = send(&app, Method::GET, "/books?categoria=tecnico", None).await;
    assert_eq!(body["total"], 1);

    let (_, body) = send(&app, Method::GET, "/books?anioDesde=1950&anioHasta=2000", None).await;
    assert_eq!(titles(&body), vec!["The Silmarillion"]);

    let (_, body) = send(&app, Method::GET, "/books?conStock=true", None).await;
    assert_eq!(titles(&body), vec!["Clean Code", "The Hobbit"]);

    let (_, body) = send(&app, Method::GET, "/books?conStock=0", None).await;
    assert_eq!(body["total"], 4);

    let (_, body) = send(&app, Method::GET, "/books?q=tolkien&conStock=1&categoria=ficcion", None).await;
    assert_eq!(titles(&body), vec!["The Hobbit"]);
}

#[tokio::test]
async fn test_list_rejects_malformed_query() {
    let app = app();
    let next_year = current_year() + 1;

    for uri in [
        "/books?limit=0".to_string(),
        "/books?limit=101".to_string(),
        "/books?page=0".to_string(),
        "/books?page=abc".to_string(),
        "/books?conStock=yes".to_string(),
        "/books?categoria=poesia".to_string(),
        "/books?anioDesde=1449".to_string(),
        format!("/books?anioHasta={}", next_year),
    ] {
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri {}", uri);
        assert_eq!(body["error"], "BadValue");
    }
}
