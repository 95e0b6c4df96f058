use anyhow::Context;
use std::sync::Arc;

use crate::module::{InitCtx, Migration, Module};

/// Ordered set of modules making up the running service.
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Register a module. Names must be unique since they prefix routes and migrations.
    pub fn register(&mut self, module: Arc<dyn Module>) -> anyhow::Result<()> {
        if self.get_module(module.name()).is_some() {
            anyhow::bail!("module '{}' is already registered", module.name());
        }
        tracing::debug!(module = module.name(), "module registered");
        self.modules.push(module);
        Ok(())
    }

    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }

    pub fn get_module(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.modules.iter().find(|module| module.name() == name)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Initialize modules in registration order
    pub async fn init_modules(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!("initializing {} modules", self.modules.len());

        for module in &self.modules {
            tracing::info!(module = module.name(), "initializing module");

            module
                .init(ctx)
                .await
                .with_context(|| format!("failed to initialize module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Start modules in registration order
    pub async fn start_modules(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        for module in &self.modules {
            tracing::info!(module = module.name(), "starting module");

            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Stop modules in reverse registration order
    pub async fn stop_modules(&self) -> anyhow::Result<()> {
        for module in self.modules.iter().rev() {
            tracing::info!(module = module.name(), "stopping module");

            module
                .stop()
                .await
                .with_context(|| format!("failed to stop module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Collect all migrations, keyed by owning module
    pub fn collect_migrations(&self) -> Vec<(String, Migration)> {
        let mut migrations: Vec<(String, Migration)> = self
            .modules
            .iter()
            .flat_map(|module| {
                module
                    .migrations()
                    .into_iter()
                    .map(move |migration| (module.name().to_string(), migration))
            })
            .collect();

        // Sort by module name and migration ID for deterministic ordering
        migrations.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(b.1.id)));

        migrations
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use std::sync::Mutex;

    struct TestModule {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl TestModule {
        fn record(&self, step: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{}", step, self.name));
        }
    }

    #[async_trait::async_trait]
    impl Module for TestModule {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
            self.record("init");
            Ok(())
        }

        async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
            self.record("start");
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.record("stop");
            Ok(())
        }

        fn migrations(&self) -> Vec<Migration> {
            vec![
                Migration {
                    id: "002_second",
                    up: "SELECT 2;",
                },
                Migration {
                    id: "001_init",
                    up: "SELECT 1;",
                },
            ]
        }
    }

    fn module(name: &'static str, calls: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Module> {
        Arc::new(TestModule {
            name,
            calls: calls.clone(),
        })
    }

    #[test]
    fn test_module_registry_creation() {
        let registry = ModuleRegistry::new();
        assert!(registry.modules().is_empty());
        assert!(registry.collect_migrations().is_empty());
    }

    #[test]
    fn test_duplicate_module_names_are_rejected() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register(module("books", &calls)).unwrap();

        let err = registry.register(module("books", &calls)).unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.module_count(), 1);
    }

    #[test]
    fn test_migrations_are_sorted_by_module_then_id() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register(module("zeta", &calls)).unwrap();
        registry.register(module("alpha", &calls)).unwrap();

        let order: Vec<String> = registry
            .collect_migrations()
            .into_iter()
            .map(|(module, migration)| format!("{}/{}", module, migration.id))
            .collect();

        assert_eq!(
            order,
            vec![
                "alpha/001_init",
                "alpha/002_second",
                "zeta/001_init",
                "zeta/002_second"
            ]
        );
    }

    #[tokio::test]
    async fn test_module_lifecycle_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register(module("first", &calls)).unwrap();
        registry.register(module("second", &calls)).unwrap();

        let settings = Settings::default();
        let pool = sqlx::SqlitePool::connect_lazy("sqlite::memory:").unwrap();
        let ctx = InitCtx {
            settings: &settings,
            db: &pool,
        };

        registry.init_modules(&ctx).await.unwrap();
        registry.start_modules(&ctx).await.unwrap();
        registry.stop_modules().await.unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "init:first",
                "init:second",
                "start:first",
                "start:second",
                "stop:second",
                "stop:first"
            ]
        );
    }
}
