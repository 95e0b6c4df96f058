//! SQLite access for bookshelf: pool construction, module migrations,
//! constraint classification, and the audited unit of work.

use std::str::FromStr;

use bookshelf_kernel::settings::DatabaseSettings;
use bookshelf_kernel::Migration;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

pub mod audit;
pub mod unit_of_work;

pub use audit::{AuditInterceptor, Audited, Clock, StoredStamps, SystemClock, WriteKind};
pub use unit_of_work::{Persist, UnitOfWork};

pub type DbPool = SqlitePool;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("invalid database url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("migration {module}/{id} failed: {source}")]
    Migration {
        module: String,
        id: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Open a connection pool for the configured database.
///
/// WAL lets readers proceed while a write transaction commits.
pub async fn connect(settings: &DatabaseSettings) -> Result<DbPool, DbError> {
    let options = SqliteConnectOptions::from_str(&settings.url)
        .map_err(|source| DbError::InvalidUrl {
            url: settings.url.clone(),
            source,
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .connect_with(options)
        .await?;

    tracing::info!(target: "bookshelf-db", url = %settings.url, "database pool ready");
    Ok(pool)
}

/// Single-connection in-memory pool. Every connection to `sqlite::memory:`
/// is a separate database, so the pool must never open a second one.
pub async fn memory_pool() -> Result<DbPool, DbError> {
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}

const MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_on TEXT NOT NULL,
        PRIMARY KEY (module, id)
    );
"#;

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Each migration runs in its own transaction together with its bookkeeping
/// row. Returns the number of migrations applied by this call.
pub async fn run_migrations(
    pool: &DbPool,
    migrations: &[(String, Migration)],
) -> Result<usize, DbError> {
    sqlx::raw_sql(MIGRATIONS_TABLE).execute(pool).await?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let already: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM schema_migrations WHERE module = ?1 AND id = ?2")
                .bind(module)
                .bind(migration.id)
                .fetch_optional(pool)
                .await?;
        if already.is_some() {
            tracing::debug!(target: "bookshelf-db", %module, id = migration.id, "migration already applied");
            continue;
        }

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .map_err(|source| DbError::Migration {
                module: module.clone(),
                id: migration.id,
                source,
            })?;
        sqlx::query("INSERT INTO schema_migrations (module, id, applied_on) VALUES (?1, ?2, ?3)")
            .bind(module)
            .bind(migration.id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(target: "bookshelf-db", %module, id = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}

/// Column named by a unique-constraint violation, if `err` is one.
///
/// SQLite reports these as `UNIQUE constraint failed: table.column`.
pub fn unique_violation_column(err: &sqlx::Error) -> Option<&str> {
    let sqlx::Error::Database(db) = err else {
        return None;
    };
    if !db.is_unique_violation() {
        return None;
    }

    let columns = db.message().rsplit(": ").next()?;
    let first = columns.split(',').next()?.trim();
    Some(first.rsplit('.').next().unwrap_or(first))
}
