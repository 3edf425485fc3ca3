//! Process settings from the environment (`.env` is loaded first by the binary).

use crate::error::ConfigError;
use crate::sql::DatabaseProvider;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://crud_admin.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    pub provider: DatabaseProvider,
    pub database_url: String,
    /// Holds `entities/*.yml` and `dashboard.yml`.
    pub config_dir: PathBuf,
    pub bind_addr: String,
    pub max_body_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let provider: DatabaseProvider = get("DATABASE_PROVIDER").unwrap_or_default().parse()?;
        let max_body_bytes = match get("MAX_BODY_BYTES") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Load(format!("MAX_BODY_BYTES is not a number: {}", raw)))?,
            None => DEFAULT_MAX_BODY_BYTES,
        };
        Ok(Settings {
            provider,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            config_dir: PathBuf::from(get("CONFIG_DIR").unwrap_or_else(|| "config".into())),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            max_body_bytes,
        })
    }
}
