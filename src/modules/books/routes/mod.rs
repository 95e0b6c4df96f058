//! HTTP handlers for the books module.
//!
//! Payloads are validated here, before the manager sees them.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bookshelf_http::error::AppError;

use super::manager::BookManager;
use super::models::{Book, BookId, BookPayload};

pub fn router(manager: BookManager) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/health", get(health_check))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .with_state(manager)
}

async fn health_check() -> &'static str {
    "books module is healthy"
}

async fn list_books(State(manager): State<BookManager>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(manager.get_all().await?))
}

async fn get_book(
    State(manager): State<BookManager>,
    id: Result<Path<BookId>, PathRejection>,
) -> Result<Json<Book>, AppError> {
    let id = book_id(id)?;
    manager
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Book with id {id} was not found.")))
}

async fn create_book(
    State(manager): State<BookManager>,
    payload: Result<Json<BookPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let payload = book_payload(payload)?;
    payload.validate()?;

    let book = manager.create(payload).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(manager): State<BookManager>,
    id: Result<Path<BookId>, PathRejection>,
    payload: Result<Json<BookPayload>, JsonRejection>,
) -> Result<Json<Book>, AppError> {
    let id = book_id(id)?;
    let payload = book_payload(payload)?;
    payload.validate()?;

    Ok(Json(manager.update(id, payload).await?))
}

async fn delete_book(
    State(manager): State<BookManager>,
    id: Result<Path<BookId>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = book_id(id)?;
    manager.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn book_id(id: Result<Path<BookId>, PathRejection>) -> Result<BookId, AppError> {
    id.map(|Path(id)| id)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

fn book_payload(payload: Result<Json<BookPayload>, JsonRejection>) -> Result<BookPayload, AppError> {
    payload
        .map(|Json(payload)| payload)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}
