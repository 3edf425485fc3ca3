//! Load entity and dashboard YAML from the config directory.
//!
//! Layout:
//! - `entities/*.yml` (sorted by file name; later files override earlier entity keys)
//! - `entities.yml` (used only when the directory yields nothing)
//! - `dashboard.yml` (optional)

use crate::config::dashboard::DashboardConfig;
use crate::config::resolved::{resolve, EntityCatalog};
use crate::config::types::{EntityConfigRoot, EntityDefinition};
use crate::config::validator::validate_dashboard;
use crate::error::ConfigError;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Read raw entity definitions without validating them.
pub fn load_entities(config_dir: &Path) -> Result<IndexMap<String, EntityDefinition>, ConfigError> {
    let mut entities = IndexMap::new();

    let dir = config_dir.join("entities");
    if dir.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "yml" || ext == "yaml"))
            .collect();
        files.sort();
        for file in files {
            tracing::debug!(file = %file.display(), "loading entity yaml");
            merge_file(&file, &mut entities)?;
        }
    }

    if entities.is_empty() {
        let fallback = config_dir.join("entities.yml");
        if !fallback.is_file() {
            return Err(ConfigError::NoEntities(config_dir.display().to_string()));
        }
        merge_file(&fallback, &mut entities)?;
    }

    Ok(entities)
}

fn merge_file(path: &Path, into: &mut IndexMap<String, EntityDefinition>) -> Result<(), ConfigError> {
    let yaml = std::fs::read_to_string(path)?;
    let root: EntityConfigRoot = serde_yaml::from_str(&yaml)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    for (name, def) in root.entities {
        into.insert(name, def);
    }
    Ok(())
}

/// Load, validate and index the entity catalog.
pub fn load_catalog(config_dir: &Path) -> Result<EntityCatalog, ConfigError> {
    let catalog = resolve(load_entities(config_dir)?)?;
    tracing::info!(count = catalog.len(), dir = %config_dir.display(), "entity catalog loaded");
    Ok(catalog)
}

/// Load `dashboard.yml`; a missing file gives an empty dashboard.
pub fn load_dashboard(config_dir: &Path, catalog: &EntityCatalog) -> Result<DashboardConfig, ConfigError> {
    let path = config_dir.join("dashboard.yml");
    if !path.is_file() {
        return Ok(DashboardConfig::default());
    }
    let yaml = std::fs::read_to_string(&path)?;
    let config: Option<DashboardConfig> = serde_yaml::from_str(&yaml)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let config = config.unwrap_or_default();
    validate_dashboard(&config)?;

    let referenced = config
        .stats
        .iter()
        .map(|s| s.entity.as_str())
        .chain(config.charts.iter().map(|c| c.entity.as_str()))
        .chain(config.charts.iter().filter_map(|c| c.label_join_entity.as_deref()));
    for name in referenced {
        if catalog.get(name).is_none() {
            tracing::warn!(entity = %name, "dashboard references unknown entity; entry will be skipped");
        }
    }
    Ok(config)
}
