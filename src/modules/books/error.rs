use bookshelf_http::error::AppError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use super::models::BookId;
use super::validation::ValidationErrors;

/// Field whose uniqueness among active books was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictField {
    Guid,
    Isbn,
}

impl std::fmt::Display for ConflictField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictField::Guid => write!(f, "Guid"),
            ConflictField::Isbn => write!(f, "ISBN"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BookError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("A book with {field} {value} already exists.")]
    Conflict { field: ConflictField, value: String },

    #[error("Book with id {id} was not found.")]
    NotFound { id: BookId },

    #[error("book store failure: {0}")]
    Store(#[from] sqlx::Error),
}

impl BookError {
    pub fn conflict(field: ConflictField, value: impl ToString) -> Self {
        Self::Conflict {
            field,
            value: value.to_string(),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::validation(
            serde_json::to_value(&errors).unwrap_or_default(),
            "One or more validation errors occurred.",
        )
    }
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::Validation(errors) => errors.into(),
            BookError::Conflict { field, ref value } => {
                AppError::conflict(json!({ "field": field, "value": value }), err.to_string())
            }
            BookError::NotFound { .. } => AppError::not_found(err.to_string()),
            BookError::Store(source) => AppError::Internal(anyhow::Error::new(source)),
        }
    }
}
