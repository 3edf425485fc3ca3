//! Resolved entity catalog: config validated and indexed for runtime use.

use crate::config::types::{ColumnDefinition, EntityDefinition};
use crate::config::validator::validate_entity;
use crate::error::ConfigError;
use indexmap::IndexMap;
use std::collections::HashMap;

/// An entity whose metadata passed validation. Only [`resolve`] constructs these,
/// so the SQL builder never sees unchecked identifiers or expressions.
#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    name: String,
    def: EntityDefinition,
}

impl ResolvedEntity {
    /// Entity key as written in the YAML (e.g. "customer").
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn def(&self) -> &EntityDefinition {
        &self.def
    }

    pub fn table(&self) -> &str {
        &self.def.table
    }

    pub fn key(&self) -> &str {
        &self.def.key
    }

    /// `table.column`
    pub fn qualified(&self, column: &str) -> String {
        format!("{}.{}", self.def.table, column)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.def.columns.get(name)
    }
}

/// All entities, looked up case-insensitively by name.
#[derive(Clone, Debug, Default)]
pub struct EntityCatalog {
    entities: Vec<ResolvedEntity>,
    by_name: HashMap<String, usize>,
}

impl EntityCatalog {
    pub fn get(&self, name: &str) -> Option<&ResolvedEntity> {
        self.by_name.get(&name.to_lowercase()).map(|&i| &self.entities[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedEntity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Validate every entity and build the catalog. Foreign keys must name known entities.
pub fn resolve(entities: IndexMap<String, EntityDefinition>) -> Result<EntityCatalog, ConfigError> {
    for (name, def) in &entities {
        validate_entity(name, def)?;
    }

    let lower_names: Vec<String> = entities.keys().map(|k| k.to_lowercase()).collect();
    for (name, def) in &entities {
        let fk_targets = def
            .columns
            .values()
            .filter_map(|c| c.foreign_key.as_ref())
            .chain(def.forms.values().filter_map(|f| f.foreign_key.as_ref()))
            .chain(def.filters.values().filter_map(|f| f.foreign_key.as_ref()));
        for fk in fk_targets {
            if !lower_names.contains(&fk.entity.to_lowercase()) {
                return Err(ConfigError::MissingReference {
                    kind: "entity",
                    id: format!("{} (foreign key of {})", fk.entity, name),
                });
            }
        }
    }

    let mut catalog = EntityCatalog::default();
    for (name, def) in entities {
        let lower = name.to_lowercase();
        if let Some(&existing) = catalog.by_name.get(&lower) {
            tracing::warn!(entity = %name, "entity name differs only by case from an earlier entity; replacing it");
            catalog.entities[existing] = ResolvedEntity { name, def };
            continue;
        }
        catalog.by_name.insert(lower, catalog.entities.len());
        catalog.entities.push(ResolvedEntity { name, def });
    }
    Ok(catalog)
}
