//! Shared application state for all routes. Config is loaded once at startup and never mutated.

use crate::config::{DashboardConfig, EntityCatalog};
use crate::hooks::HookRegistry;
use crate::service::CrudRepository;
use crate::sql::SqlDialect;
use sqlx::AnyPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: AnyPool,
    pub catalog: Arc<EntityCatalog>,
    pub dashboard: Arc<DashboardConfig>,
    pub dialect: Arc<dyn SqlDialect>,
    pub hooks: Arc<HookRegistry>,
    pub repo: CrudRepository,
}

impl AppState {
    pub fn new(
        pool: AnyPool,
        dialect: Arc<dyn SqlDialect>,
        catalog: EntityCatalog,
        dashboard: DashboardConfig,
        hooks: HookRegistry,
    ) -> Self {
        AppState {
            repo: CrudRepository::new(pool.clone(), dialect.clone()),
            pool,
            catalog: Arc::new(catalog),
            dashboard: Arc::new(dashboard),
            dialect,
            hooks: Arc::new(hooks),
        }
    }
}
