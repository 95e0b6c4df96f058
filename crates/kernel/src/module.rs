use async_trait::async_trait;
use axum::Router;
use sqlx::SqlitePool;

/// Everything a module may borrow while it is initialized or started.
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
    pub db: &'a SqlitePool,
}

/// A named schema change owned by a module.
///
/// `up` may hold several statements; it is executed as one script.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// A unit of functionality plugged into the service.
///
/// Lifecycle order: `init` → migrations → `start` → serving → `stop`.
#[async_trait]
pub trait Module: Sync + Send {
    /// Name used for logging, migration bookkeeping and the `/api/{name}` prefix.
    fn name(&self) -> &'static str;

    /// Build module state from settings and the database pool.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// HTTP routes, mounted under `/api/{name}`.
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment (`paths` and `components.schemas`) merged into the service document.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Schema changes, applied once each in id order.
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Called once migrations have been applied.
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called on shutdown, in reverse registration order.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
