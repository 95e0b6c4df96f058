use async_trait::async_trait;
use sqlx::{Sqlite, SqliteConnection, Transaction};

use crate::audit::{AuditInterceptor, Audited, StoredStamps, WriteKind};
use crate::DbPool;

/// An audited entity that knows how to write itself.
///
/// `update` must not write the creation timestamp column.
#[async_trait]
pub trait Persist: Audited + Send + Sync {
    /// Insert the entity, capturing any store-assigned key.
    async fn insert(&mut self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error>;

    /// Overwrite the stored row with the entity's current state, picking up
    /// any column the store keeps authority over.
    async fn update(&mut self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error>;

    /// Audit columns currently persisted for this entity.
    async fn stored_stamps(&self, conn: &mut SqliteConnection) -> Result<Option<StoredStamps>, sqlx::Error>;
}

/// One write transaction with the audit interceptor hooked into every save.
///
/// The transaction takes SQLite's write lock up front (`BEGIN IMMEDIATE`),
/// so an update that reads before it writes never needs a lock upgrade and
/// concurrent writers queue on the busy timeout instead of failing.
/// Dropping without [`UnitOfWork::commit`] rolls the transaction back.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    interceptor: AuditInterceptor,
}

impl UnitOfWork {
    pub async fn begin(pool: &DbPool, interceptor: AuditInterceptor) -> Result<Self, sqlx::Error> {
        let tx = pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(Self { tx, interceptor })
    }

    /// Stamp and write `entity` within this transaction.
    pub async fn save<E: Persist>(&mut self, entity: &mut E, kind: WriteKind) -> Result<(), sqlx::Error> {
        match kind {
            WriteKind::Insert => {
                self.interceptor.before_save(entity, kind, None);
                entity.insert(&mut *self.tx).await
            }
            WriteKind::Update => {
                let stored = entity.stored_stamps(&mut *self.tx).await?;
                self.interceptor.before_save(entity, kind, stored);
                entity.update(&mut *self.tx).await
            }
        }
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}
