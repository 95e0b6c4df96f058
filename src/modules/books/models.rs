use bookshelf_db::Audited;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store-assigned book identifier.
pub type BookId = u32;

/// A catalog record as persisted in the `books` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Store-assigned, monotonic, never reused
    pub id: BookId,
    /// Caller-facing identity; unique among active books
    pub guid: Uuid,
    pub title: String,
    pub author: String,
    /// Unique among active books
    pub isbn: String,
    pub description: Option<String>,
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
    pub cover_image_url: Option<String>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    /// `false` once soft-deleted
    pub is_active: bool,
}

impl Book {
    /// Unsaved, active record built from a payload.
    ///
    /// `id` and the audit timestamps are placeholders until the record is saved.
    pub fn new(guid: Uuid, payload: BookPayload) -> Self {
        let mut book = Self {
            id: 0,
            guid,
            title: String::new(),
            author: String::new(),
            isbn: String::new(),
            description: None,
            publication_year: None,
            genre: None,
            cover_image_url: None,
            created_on: DateTime::<Utc>::default(),
            updated_on: DateTime::<Utc>::default(),
            is_active: true,
        };
        book.apply(payload);
        book
    }

    /// Overwrite the editable fields. Identity, activity and audit fields are untouched.
    pub fn apply(&mut self, payload: BookPayload) {
        self.title = payload.title;
        self.author = payload.author;
        self.isbn = payload.isbn;
        self.description = payload.description;
        self.publication_year = payload.publication_year;
        self.genre = payload.genre;
        self.cover_image_url = payload.cover_image_url;
    }
}

impl Audited for Book {
    fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }

    fn updated_on(&self) -> DateTime<Utc> {
        self.updated_on
    }

    fn set_created_on(&mut self, at: DateTime<Utc>) {
        self.created_on = at;
    }

    fn set_updated_on(&mut self, at: DateTime<Utc>) {
        self.updated_on = at;
    }
}

/// Request body for creating or updating a book.
///
/// Missing fields deserialize to empty values so the validator can report them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookPayload {
    /// Nil means "generate one" when creating; ignored when updating
    pub guid: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub description: Option<String>,
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
    pub cover_image_url: Option<String>,
}
