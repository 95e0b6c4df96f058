//! Create/read/update/soft-delete of books.
//!
//! GUID and ISBN uniqueness hold among active books only. The manager checks
//! them up front for a clear error, and the store's partial unique indexes
//! back the check up when two writers race; a constraint violation is
//! reported as the same conflict.

use std::sync::Arc;

use bookshelf_db::{unique_violation_column, AuditInterceptor, DbPool, UnitOfWork, WriteKind};
use uuid::Uuid;

use super::cover::{CoverImageProvider, NoCovers};
use super::error::{BookError, ConflictField};
use super::models::{Book, BookId, BookPayload};
use super::store;

/// Stateless between calls; every operation is one unit of work on the store.
#[derive(Clone)]
pub struct BookManager {
    pool: DbPool,
    interceptor: AuditInterceptor,
    covers: Arc<dyn CoverImageProvider>,
}

impl BookManager {
    pub fn new(pool: DbPool, covers: Arc<dyn CoverImageProvider>) -> Self {
        Self {
            pool,
            interceptor: AuditInterceptor::system(),
            covers,
        }
    }

    /// Manager without cover enrichment.
    pub fn without_covers(pool: DbPool) -> Self {
        Self::new(pool, Arc::new(NoCovers))
    }

    pub fn with_interceptor(mut self, interceptor: AuditInterceptor) -> Self {
        self.interceptor = interceptor;
        self
    }

    /// The book with this id, if it exists and is active.
    pub async fn get_by_id(&self, id: BookId) -> Result<Option<Book>, BookError> {
        Ok(store::find_active_by_id(&self.pool, id).await?)
    }

    /// Every active book, ordered by id.
    pub async fn get_all(&self) -> Result<Vec<Book>, BookError> {
        Ok(store::list_active(&self.pool).await?)
    }

    pub async fn create(&self, payload: BookPayload) -> Result<Book, BookError> {
        let supplied_guid = !payload.guid.is_nil();
        let guid = if supplied_guid {
            payload.guid
        } else {
            Uuid::new_v4()
        };

        if supplied_guid && store::active_guid_owner(&self.pool, guid).await?.is_some() {
            return Err(BookError::conflict(ConflictField::Guid, guid));
        }
        if !payload.isbn.trim().is_empty()
            && store::active_isbn_owner(&self.pool, &payload.isbn)
                .await?
                .is_some()
        {
            return Err(BookError::conflict(ConflictField::Isbn, &payload.isbn));
        }

        let mut book = Book::new(guid, payload);
        self.enrich(&mut book).await;

        let mut uow = UnitOfWork::begin(&self.pool, self.interceptor.clone()).await?;
        uow.save(&mut book, WriteKind::Insert)
            .await
            .map_err(|err| classify(err, &book))?;
        uow.commit().await?;

        tracing::info!(book_id = book.id, guid = %book.guid, isbn = %book.isbn, "book created");
        Ok(book)
    }

    /// Overwrite a book's editable fields. Inactive books can be updated and stay inactive.
    pub async fn update(&self, id: BookId, payload: BookPayload) -> Result<Book, BookError> {
        let mut book = store::find_by_id(&self.pool, id)
            .await?
            .ok_or(BookError::NotFound { id })?;

        if !payload.isbn.trim().is_empty() {
            let owner = store::active_isbn_owner(&self.pool, &payload.isbn).await?;
            if owner.is_some_and(|owner| owner != id) {
                return Err(BookError::conflict(ConflictField::Isbn, &payload.isbn));
            }
        }

        book.apply(payload);
        self.enrich(&mut book).await;

        let mut uow = UnitOfWork::begin(&self.pool, self.interceptor.clone()).await?;
        uow.save(&mut book, WriteKind::Update)
            .await
            .map_err(|err| classify(err, &book))?;
        uow.commit().await?;

        tracing::info!(book_id = book.id, is_active = book.is_active, "book updated");
        Ok(book)
    }

    /// Soft delete: the row stays, flagged inactive.
    pub async fn delete(&self, id: BookId) -> Result<Book, BookError> {
        let mut book = store::find_by_id(&self.pool, id)
            .await?
            .ok_or(BookError::NotFound { id })?;

        book.is_active = false;

        let mut uow = UnitOfWork::begin(&self.pool, self.interceptor.clone()).await?;
        uow.save(&mut book, WriteKind::Update).await?;
        uow.commit().await?;

        tracing::info!(book_id = book.id, "book deactivated");
        Ok(book)
    }

    /// Fill a missing cover URL. Runs before any transaction is opened.
    async fn enrich(&self, book: &mut Book) {
        if book.cover_image_url.is_some() || book.isbn.trim().is_empty() {
            return;
        }

        book.cover_image_url = self.covers.fetch_cover_url(&book.isbn).await;
        if book.cover_image_url.is_some() {
            tracing::debug!(isbn = %book.isbn, "cover image found");
        }
    }
}

/// Turn a unique-index violation back into the conflict it represents.
fn classify(err: sqlx::Error, book: &Book) -> BookError {
    let column = unique_violation_column(&err).map(str::to_owned);
    match column.as_deref() {
        Some("guid") => BookError::conflict(ConflictField::Guid, book.guid),
        Some("isbn") => BookError::conflict(ConflictField::Isbn, &book.isbn),
        _ => BookError::Store(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::store::CREATE_BOOKS;
    use async_trait::async_trait;
    use bookshelf_db::{memory_pool, run_migrations, Clock};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct SteppingClock(Mutex<DateTime<Utc>>);

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut now = self.0.lock().unwrap();
            *now += Duration::milliseconds(10);
            *now
        }
    }

    /// Counts lookups and answers with a fixed URL.
    #[derive(Default)]
    struct FixedCovers {
        url: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CoverImageProvider for FixedCovers {
        async fn fetch_cover_url(&self, _isbn: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.url.clone()
        }
    }

    async fn pool() -> DbPool {
        let pool = memory_pool().await.unwrap();
        run_migrations(&pool, &[("books".to_string(), CREATE_BOOKS)])
            .await
            .unwrap();
        pool
    }

    fn stepping() -> AuditInterceptor {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        AuditInterceptor::new(Arc::new(SteppingClock(Mutex::new(start))))
    }

    async fn manager() -> BookManager {
        BookManager::without_covers(pool().await).with_interceptor(stepping())
    }

    fn payload(guid: Uuid, isbn: &str) -> BookPayload {
        BookPayload {
            guid,
            title: "A Wizard of Earthsea".into(),
            author: "Ursula K. Le Guin".into(),
            isbn: isbn.into(),
            ..Default::default()
        }
    }

    const I1: &str = "9780547773742";
    const I2: &str = "9780689845338";

    #[tokio::test]
    async fn create_assigns_store_fields() {
        let manager = manager().await;
        let guid = Uuid::new_v4();

        let book = manager.create(payload(guid, I1)).await.unwrap();

        assert_eq!(book.id, 1);
        assert_eq!(book.guid, guid);
        assert!(book.is_active);
        assert_eq!(book.created_on, book.updated_on);
        assert_eq!(manager.get_by_id(book.id).await.unwrap(), Some(book));
    }

    #[tokio::test]
    async fn nil_guid_is_replaced() {
        let manager = manager().await;
        let first = manager.create(payload(Uuid::nil(), I1)).await.unwrap();
        let second = manager.create(payload(Uuid::nil(), I2)).await.unwrap();

        assert!(!first.guid.is_nil());
        assert_ne!(first.guid, second.guid);
    }

    #[tokio::test]
    async fn duplicate_active_guid_conflicts() {
        let manager = manager().await;
        let guid = Uuid::new_v4();
        manager.create(payload(guid, I1)).await.unwrap();

        let err = manager.create(payload(guid, I2)).await.unwrap_err();
        assert!(matches!(err, BookError::Conflict { field: ConflictField::Guid, .. }));
        assert_eq!(err.to_string(), format!("A book with Guid {guid} already exists."));
    }

    #[tokio::test]
    async fn duplicate_active_isbn_conflicts() {
        let manager = manager().await;
        manager.create(payload(Uuid::new_v4(), I1)).await.unwrap();

        let err = manager.create(payload(Uuid::new_v4(), I1)).await.unwrap_err();
        assert!(matches!(err, BookError::Conflict { field: ConflictField::Isbn, ref value } if value == I1));
    }

    #[tokio::test]
    async fn soft_deleted_books_are_invisible() {
        let manager = manager().await;
        let kept = manager.create(payload(Uuid::new_v4(), I1)).await.unwrap();
        let gone = manager.create(payload(Uuid::new_v4(), I2)).await.unwrap();

        let deleted = manager.delete(gone.id).await.unwrap();
        assert!(!deleted.is_active);
        assert!(deleted.updated_on > gone.updated_on);
        assert_eq!(deleted.created_on, gone.created_on);

        assert_eq!(manager.get_by_id(gone.id).await.unwrap(), None);
        let all = manager.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, kept.id);
        assert!(all.iter().all(|book| book.is_active));
    }

    #[tokio::test]
    async fn update_refreshes_only_updated_on() {
        let manager = manager().await;
        let guid = Uuid::new_v4();
        let created = manager.create(payload(guid, I1)).await.unwrap();

        let mut changes = payload(Uuid::new_v4(), I1);
        changes.title = "The Tombs of Atuan".into();
        changes.publication_year = Some(1970);
        let updated = manager.update(created.id, changes).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.guid, guid);
        assert_eq!(updated.title, "The Tombs of Atuan");
        assert_eq!(updated.publication_year, Some(1970));
        assert_eq!(updated.created_on, created.created_on);
        assert!(updated.updated_on > created.updated_on);
        assert_eq!(manager.get_by_id(created.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let manager = manager().await;

        assert_eq!(manager.get_by_id(99).await.unwrap(), None);
        assert!(matches!(
            manager.update(99, payload(Uuid::new_v4(), I1)).await,
            Err(BookError::NotFound { id: 99 })
        ));
        assert!(matches!(manager.delete(99).await, Err(BookError::NotFound { id: 99 })));
    }

    #[tokio::test]
    async fn updating_a_deleted_book_keeps_it_inactive() {
        let manager = manager().await;
        let book = manager.create(payload(Uuid::new_v4(), I1)).await.unwrap();
        manager.delete(book.id).await.unwrap();

        let updated = manager.update(book.id, payload(Uuid::nil(), I1)).await.unwrap();

        assert!(!updated.is_active);
        assert_eq!(manager.get_by_id(book.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn catalog_lifecycle_scenario() {
        let manager = manager().await;
        let g1 = Uuid::new_v4();

        let a = manager.create(payload(g1, I1)).await.unwrap();
        assert!(a.is_active);

        let err = manager.create(payload(g1, I2)).await.unwrap_err();
        assert!(matches!(err, BookError::Conflict { field: ConflictField::Guid, .. }));

        let a = manager.delete(a.id).await.unwrap();
        assert!(!a.is_active);

        let c = manager.create(payload(g1, I1)).await.unwrap();
        assert!(c.is_active);
        assert_ne!(c.id, a.id);

        let c = manager.update(c.id, payload(g1, I1)).await.unwrap();
        assert_eq!(c.isbn, I1);

        let other = manager.create(payload(Uuid::new_v4(), I2)).await.unwrap();
        let err = manager.update(c.id, payload(g1, &other.isbn)).await.unwrap_err();
        assert!(matches!(err, BookError::Conflict { field: ConflictField::Isbn, .. }));
    }

    #[tokio::test]
    async fn missing_cover_is_enriched() {
        let covers = Arc::new(FixedCovers {
            url: Some("https://covers.example.com/b/isbn/9780547773742-L.jpg".into()),
            ..Default::default()
        });
        let manager = BookManager::new(pool().await, covers.clone());

        let book = manager.create(payload(Uuid::new_v4(), I1)).await.unwrap();

        assert_eq!(
            book.cover_image_url.as_deref(),
            Some("https://covers.example.com/b/isbn/9780547773742-L.jpg")
        );
        assert_eq!(covers.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn supplied_cover_skips_lookup() {
        let covers = Arc::new(FixedCovers::default());
        let manager = BookManager::new(pool().await, covers.clone());

        let mut with_cover = payload(Uuid::new_v4(), I1);
        with_cover.cover_image_url = Some("https://example.com/own.jpg".into());
        let book = manager.create(with_cover).await.unwrap();

        assert_eq!(book.cover_image_url.as_deref(), Some("https://example.com/own.jpg"));
        assert_eq!(covers.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_lookup_leaves_cover_empty() {
        let covers = Arc::new(FixedCovers::default());
        let manager = BookManager::new(pool().await, covers.clone());

        let book = manager.create(payload(Uuid::new_v4(), I1)).await.unwrap();

        assert_eq!(book.cover_image_url, None);
        assert_eq!(covers.calls.load(Ordering::SeqCst), 1);
    }

    /// Inserts a competing book during the lookup, i.e. after the
    /// manager's uniqueness check and before its insert.
    struct RacingWriter {
        rival: BookManager,
    }

    #[async_trait]
    impl CoverImageProvider for RacingWriter {
        async fn fetch_cover_url(&self, isbn: &str) -> Option<String> {
            let mut rival = payload(Uuid::new_v4(), isbn);
            rival.cover_image_url = Some("https://example.com/rival.jpg".into());
            self.rival.create(rival).await.unwrap();
            None
        }
    }

    #[tokio::test]
    async fn store_constraint_backs_up_the_check() {
        let pool = pool().await;
        let manager = BookManager::new(
            pool.clone(),
            Arc::new(RacingWriter {
                rival: BookManager::without_covers(pool.clone()),
            }),
        );

        let err = manager.create(payload(Uuid::new_v4(), I1)).await.unwrap_err();

        assert!(matches!(err, BookError::Conflict { field: ConflictField::Isbn, .. }));
        assert_eq!(manager.get_all().await.unwrap().len(), 1);
    }

    /// Pool over a fresh database file, so connections genuinely contend.
    async fn file_pool(name: &str) -> DbPool {
        let path = std::env::temp_dir().join(format!("bookshelf-{}-{}.db", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        let settings = bookshelf_kernel::settings::DatabaseSettings {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            max_connections: 5,
        };

        let pool = bookshelf_db::connect(&settings).await.unwrap();
        run_migrations(&pool, &[("books".to_string(), CREATE_BOOKS)])
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn concurrent_writes_to_one_book_all_succeed() {
        let manager = BookManager::without_covers(file_pool("concurrent-writes").await);
        let book = manager.create(payload(Uuid::new_v4(), I1)).await.unwrap();

        let mut writers = Vec::new();
        for n in 0..40 {
            let manager = manager.clone();
            writers.push(tokio::spawn(async move {
                let mut changes = payload(Uuid::new_v4(), I1);
                changes.title = format!("Revision {n}");
                manager.update(book.id, changes).await.map(|_| ())
            }));
        }
        for _ in 0..5 {
            let manager = manager.clone();
            writers.push(tokio::spawn(async move { manager.delete(book.id).await.map(|_| ()) }));
        }

        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let stored = store::find_by_id(&manager.pool, book.id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.created_on, book.created_on);
        assert!(stored.updated_on > book.updated_on);
    }
}
