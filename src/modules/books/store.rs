//! The `books` table: schema, row writes, and exact-match lookups.

use async_trait::async_trait;
use bookshelf_db::{DbPool, Persist, StoredStamps};
use bookshelf_kernel::Migration;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::models::{Book, BookId};

/// The partial unique indexes enforce uniqueness among active rows only, so
/// soft-deleted rows never block reuse of a GUID or ISBN.
pub const CREATE_BOOKS: Migration = Migration {
    id: "001_create_books",
    up: r#"
        CREATE TABLE books (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            guid             BLOB    NOT NULL,
            title            TEXT    NOT NULL,
            author           TEXT    NOT NULL,
            isbn             TEXT    NOT NULL,
            description      TEXT,
            publication_year INTEGER,
            genre            TEXT,
            cover_image_url  TEXT,
            created_on       TEXT    NOT NULL,
            updated_on       TEXT    NOT NULL,
            is_active        INTEGER NOT NULL DEFAULT 1 CHECK (is_active IN (0, 1))
        );
        CREATE UNIQUE INDEX ux_books_active_guid ON books (guid) WHERE is_active = 1;
        CREATE UNIQUE INDEX ux_books_active_isbn ON books (isbn) WHERE is_active = 1;
    "#,
};

const SELECT_BOOK: &str = "SELECT id, guid, title, author, isbn, description, publication_year, \
     genre, cover_image_url, created_on, updated_on, is_active FROM books";

/// Any book with this id, active or not.
pub async fn find_by_id(pool: &DbPool, id: BookId) -> Result<Option<Book>, sqlx::Error> {
    sqlx::query_as::<_, Book>(&format!("{SELECT_BOOK} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_active_by_id(pool: &DbPool, id: BookId) -> Result<Option<Book>, sqlx::Error> {
    sqlx::query_as::<_, Book>(&format!("{SELECT_BOOK} WHERE id = ?1 AND is_active = 1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Active books in id order.
pub async fn list_active(pool: &DbPool) -> Result<Vec<Book>, sqlx::Error> {
    sqlx::query_as::<_, Book>(&format!("{SELECT_BOOK} WHERE is_active = 1 ORDER BY id"))
        .fetch_all(pool)
        .await
}

pub async fn active_guid_owner(pool: &DbPool, guid: Uuid) -> Result<Option<BookId>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM books WHERE guid = ?1 AND is_active = 1")
        .bind(guid)
        .fetch_optional(pool)
        .await
}

pub async fn active_isbn_owner(pool: &DbPool, isbn: &str) -> Result<Option<BookId>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM books WHERE isbn = ?1 AND is_active = 1")
        .bind(isbn)
        .fetch_optional(pool)
        .await
}

#[async_trait]
impl Persist for Book {
    async fn insert(&mut self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO books (guid, title, author, isbn, description, publication_year, genre, \
             cover_image_url, created_on, updated_on, is_active) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(self.guid)
        .bind(&self.title)
        .bind(&self.author)
        .bind(&self.isbn)
        .bind(&self.description)
        .bind(self.publication_year)
        .bind(&self.genre)
        .bind(&self.cover_image_url)
        .bind(self.created_on)
        .bind(self.updated_on)
        .bind(self.is_active)
        .execute(conn)
        .await?;

        self.id = BookId::try_from(result.last_insert_rowid())
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        Ok(())
    }

    // guid and created_on are write-once and absent here. is_active can only
    // go from 1 to 0, so an update racing a delete cannot revive the row.
    async fn update(&mut self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        self.is_active = sqlx::query_scalar(
            "UPDATE books SET title = ?1, author = ?2, isbn = ?3, description = ?4, \
             publication_year = ?5, genre = ?6, cover_image_url = ?7, updated_on = ?8, \
             is_active = MIN(is_active, ?9) WHERE id = ?10 RETURNING is_active",
        )
        .bind(&self.title)
        .bind(&self.author)
        .bind(&self.isbn)
        .bind(&self.description)
        .bind(self.publication_year)
        .bind(&self.genre)
        .bind(&self.cover_image_url)
        .bind(self.updated_on)
        .bind(self.is_active)
        .bind(self.id)
        .fetch_one(conn)
        .await?;
        Ok(())
    }

    async fn stored_stamps(&self, conn: &mut SqliteConnection) -> Result<Option<StoredStamps>, sqlx::Error> {
        sqlx::query_as("SELECT created_on, updated_on FROM books WHERE id = ?1")
            .bind(self.id)
            .fetch_optional(conn)
            .await
    }
}
