//! Module declaration and lifecycle implementation

use crate::config::Config;
use crate::domain::{HostBindings, Service};
use anyhow::Result;
use parking_lot::RwLock;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Content filter module
pub struct ContentFilterModule {
    config: RwLock<Config>,
    service: RwLock<Option<Arc<Service>>>,
}

impl Default for ContentFilterModule {
    fn default() -> Self {
        Self {
            config: RwLock::new(Config::default()),
            service: RwLock::new(None),
        }
    }
}

impl ContentFilterModule {
    /// Build the domain service, write default records and attach hooks
    pub async fn init(&self, cfg: Config, bindings: HostBindings) -> Result<()> {
        let current_site = bindings.sites.current_site();
        let service = Arc::new(Service::new(bindings, &cfg));
        *self.config.write() = cfg;

        service.activate(current_site).await?;
        let reports = service.bootstrap().await;
        for report in &reports {
            tracing::info!(
                surface = %report.surface,
                registered = report.registered.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "Hook registration pass finished"
            );
        }

        *self.service.write() = Some(service);
        tracing::info!("Content filter initialized");
        Ok(())
    }

    /// Build the SeaORM-backed options repository
    pub fn options_repository(
        db: Arc<DatabaseConnection>,
    ) -> Arc<dyn crate::domain::OptionsRepository> {
        Arc::new(crate::infra::storage::repositories::SeaOrmOptionsRepository::new(db))
    }

    /// Process memory probe honouring `memory_limit_bytes`
    pub fn memory_probe(cfg: &Config) -> Arc<dyn crate::domain::MemoryProbe> {
        Arc::new(crate::infra::memory::SysinfoMemoryProbe::new(
            cfg.memory_limit_bytes,
        ))
    }

    /// Run database migrations
    pub async fn migrate(&self, db: &DatabaseConnection) -> Result<()> {
        use crate::infra::storage::migrations::Migrator;
        use sea_orm_migration::MigratorTrait;

        Migrator::up(db, None).await?;
        tracing::info!("Content filter migrations completed");
        Ok(())
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    pub fn service(&self) -> Result<Arc<Service>> {
        self.service
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Service not initialized"))
    }

    /// In-process client for other modules
    pub fn client(&self) -> Result<Arc<dyn crate::contract::ContentFilterApi>> {
        Ok(Arc::new(crate::api::native::NativeClient::new(self.service()?)))
    }

    /// Mount the management routes
    pub fn register_rest(&self, router: axum::Router) -> Result<axum::Router> {
        let service = self.service()?;
        tracing::info!("Registering content filter REST routes");
        crate::api::rest::routes::register_routes(router, service)
    }

    /// Detach hooks; with `remove_data`, delete every stored record
    pub async fn shutdown(&self, remove_data: bool) -> Result<()> {
        let service = self.service.write().take();
        if let Some(service) = service {
            service.uninstall(remove_data).await?;
        }
        Ok(())
    }
}
