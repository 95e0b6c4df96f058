//! Service bootstrap: settings → pool → modules → migrations → HTTP.

use anyhow::Context;
use bookshelf_db::DbPool;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// A fully initialized, migrated service that has not started serving.
pub struct App {
    pub settings: Settings,
    pub pool: DbPool,
    pub registry: ModuleRegistry,
}

impl App {
    pub fn ctx(&self) -> InitCtx<'_> {
        InitCtx {
            settings: &self.settings,
            db: &self.pool,
        }
    }

    pub fn router(&self) -> axum::Router {
        bookshelf_http::build_router(&self.registry, &self.settings)
    }
}

/// Connect, register and initialize modules, then apply their migrations.
async fn prepare(settings: Settings) -> anyhow::Result<(App, usize)> {
    tracing::info!(env = ?settings.environment, db = %settings.database.url, "bookshelf bootstrap starting");

    let pool = bookshelf_db::connect(&settings.database)
        .await
        .with_context(|| format!("failed to open database {}", settings.database.url))?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry)?;

    let app = App {
        settings,
        pool,
        registry,
    };
    app.registry.init_modules(&app.ctx()).await?;

    let applied = bookshelf_db::run_migrations(&app.pool, &app.registry.collect_migrations())
        .await
        .context("failed to run migrations")?;
    tracing::info!(applied, "migrations complete");

    Ok((app, applied))
}

/// Initialize modules and apply their migrations.
pub async fn bootstrap(settings: Settings) -> anyhow::Result<App> {
    let (app, _) = prepare(settings).await?;
    tracing::info!(modules = app.registry.module_count(), "bookshelf bootstrap complete");
    Ok(app)
}

/// Run the service until shutdown.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let app = bootstrap(settings).await?;

    app.registry.start_modules(&app.ctx()).await?;
    let served = bookshelf_http::start_server(&app.registry, &app.settings).await;
    app.registry.stop_modules().await?;
    app.pool.close().await;

    served
}

/// Apply pending migrations and exit. Returns how many were applied.
pub async fn migrate(settings: Settings) -> anyhow::Result<usize> {
    let (app, applied) = prepare(settings).await?;
    app.pool.close().await;
    Ok(applied)
}
