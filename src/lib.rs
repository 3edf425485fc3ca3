//! CRUD admin: configuration-driven admin backend. Entity YAML becomes parameterized SQL for list,
//! form, read, create, update and delete screens plus a dashboard.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod hooks;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;

pub use config::{load_catalog, load_dashboard, resolve, DashboardConfig, EntityCatalog, ResolvedEntity};
pub use error::{AppError, ConfigError};
pub use hooks::{EntityHook, HookRegistry};
pub use routes::{build_router, common_routes, entity_routes};
pub use service::audit::ensure_audit_table;
pub use service::CrudRepository;
pub use settings::Settings;
pub use sql::{DatabaseProvider, SqlDialect};
pub use state::AppState;
