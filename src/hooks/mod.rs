//! Named before/after hooks around entity create and update.
//!
//! Entities opt in through `hooks.beforeCreate`, `hooks.afterUpdate`, ... in their YAML.
//! Hooks run inside the write transaction; returning an error from `after` rolls it back.

mod samples;

pub use samples::{ConsoleLogAfterHook, CustomerEmailDomainHook, CustomerNameNormalizeHook, InvoiceMinimumTotalHook};

use crate::error::AppError;
use crate::sql::SqlValue;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::AnyConnection;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrudOperation {
    Create,
    Update,
}

impl fmt::Display for CrudOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CrudOperation::Create => "create",
            CrudOperation::Update => "update",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookResult {
    Continue,
    /// Cancel the write; the message is reported to the caller.
    Abort(String),
}

/// Shared by `before` and `after` of one write.
#[derive(Clone, Debug)]
pub struct HookContext {
    pub entity: String,
    pub operation: CrudOperation,
    /// Set for updates, and for creates once the backend reports the new key.
    pub id: Option<SqlValue>,
    /// Converted form values; `before` may rewrite them.
    pub values: HashMap<String, SqlValue>,
    pub user: Option<String>,
    /// Scratch space carried from `before` to `after`.
    pub data: HashMap<String, Value>,
}

impl HookContext {
    pub fn new(entity: impl Into<String>, operation: CrudOperation, values: HashMap<String, SqlValue>) -> Self {
        HookContext {
            entity: entity.into(),
            operation,
            id: None,
            values,
            user: None,
            data: HashMap::new(),
        }
    }
}

#[async_trait]
pub trait EntityHook: Send + Sync {
    /// Name referenced from entity YAML; matched case-insensitively.
    fn name(&self) -> &str;

    async fn before(&self, ctx: &mut HookContext, conn: &mut AnyConnection) -> Result<HookResult, AppError>;

    async fn after(&self, ctx: &HookContext, conn: &mut AnyConnection) -> Result<(), AppError>;
}

#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Arc<dyn EntityHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled sample hooks.
    pub fn with_samples() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CustomerEmailDomainHook));
        registry.register(Arc::new(InvoiceMinimumTotalHook));
        registry.register(Arc::new(ConsoleLogAfterHook));
        registry.register(Arc::new(CustomerNameNormalizeHook));
        tracing::info!(count = registry.len(), "hook registry initialized");
        registry
    }

    /// Later registrations win.
    pub fn register(&mut self, hook: Arc<dyn EntityHook>) {
        let key = hook.name().to_lowercase();
        if self.hooks.contains_key(&key) {
            tracing::warn!(hook = %hook.name(), "duplicate hook name; overwriting");
        }
        self.hooks.insert(key, hook);
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn EntityHook>> {
        let found = self.hooks.get(&name.to_lowercase()).cloned();
        if found.is_none() {
            tracing::warn!(hook = %name, "hook not found in registry; check entity yaml and registration");
        }
        found
    }

    /// Resolve an optional configured name; blank names are treated as unset.
    pub fn find_configured(&self, name: Option<&str>) -> Option<Arc<dyn EntityHook>> {
        name.map(str::trim).filter(|n| !n.is_empty()).and_then(|n| self.find(n))
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.hooks.keys().collect();
        names.sort();
        f.debug_struct("HookRegistry").field("hooks", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl EntityHook for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn before(&self, _ctx: &mut HookContext, _conn: &mut AnyConnection) -> Result<HookResult, AppError> {
            Ok(HookResult::Abort(self.0.to_string()))
        }

        async fn after(&self, _ctx: &HookContext, _conn: &mut AnyConnection) -> Result<(), AppError> {
            Ok(())
        }
    }

    #[test]
    fn lookup_ignores_case() {
        let registry = HookRegistry::with_samples();
        assert_eq!(registry.len(), 4);
        assert!(registry.find("Customer_Email_Domain").is_some());
        assert!(registry.find("missing").is_none());
        assert!(registry.find_configured(Some("  ")).is_none());
        assert!(registry.find_configured(None).is_none());
    }

    #[test]
    fn duplicate_overwrites() {
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(Named("audit")));
        registry.register(Arc::new(Named("AUDIT")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("audit").unwrap().name(), "AUDIT");
    }
}
