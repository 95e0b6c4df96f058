//! Creation/update timestamps for audited entities.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

/// An entity carrying `created_on`/`updated_on` audit columns.
pub trait Audited {
    fn created_on(&self) -> DateTime<Utc>;
    fn updated_on(&self) -> DateTime<Utc>;
    fn set_created_on(&mut self, at: DateTime<Utc>);
    fn set_updated_on(&mut self, at: DateTime<Utc>);
}

/// Audit columns as currently persisted for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredStamps {
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

/// Kind of write an entity is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

/// Source of "now" for audit stamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Stamps audit timestamps on entities right before they are written.
///
/// Invoked by [`crate::UnitOfWork::save`] inside the write's transaction.
#[derive(Clone)]
pub struct AuditInterceptor {
    clock: Arc<dyn Clock>,
}

impl AuditInterceptor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Apply the stamps for a pending write.
    ///
    /// For updates, `stored` holds the columns as persisted. Its creation
    /// time replaces whatever the in-memory entity holds, so creation time is
    /// write-once. `updated_on` never precedes `created_on` and always moves
    /// past the previous `updated_on`, even if the clock stepped back.
    pub fn before_save<E>(&self, entity: &mut E, kind: WriteKind, stored: Option<StoredStamps>)
    where
        E: Audited + ?Sized,
    {
        let now = self.clock.now();
        match kind {
            WriteKind::Insert => {
                entity.set_created_on(now);
                entity.set_updated_on(now);
            }
            WriteKind::Update => {
                let previous = match stored {
                    Some(stored) => {
                        entity.set_created_on(stored.created_on);
                        stored.updated_on
                    }
                    None => entity.updated_on(),
                };
                let after_previous = previous + Duration::microseconds(1);
                entity.set_updated_on(now.max(entity.created_on()).max(after_previous));
            }
        }
    }
}

impl std::fmt::Debug for AuditInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditInterceptor").finish_non_exhaustive()
    }
}
