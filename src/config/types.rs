//! Raw config types matching the entity YAML (camelCase keys).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Localized text: exact locale, then same language, then en-US, then en, then fallback.
pub fn resolve_label(map: Option<&HashMap<String, String>>, fallback: &str, locale: &str) -> String {
    let Some(map) = map.filter(|m| !m.is_empty()) else {
        return fallback.to_string();
    };
    let usable = |v: &&String| !v.trim().is_empty();

    if let Some(v) = map.get(locale).filter(usable) {
        return v.clone();
    }
    let language = locale.split(['-', '_']).next().unwrap_or(locale).to_lowercase();
    if !language.is_empty() {
        let mut keys: Vec<&String> = map.keys().filter(|k| k.to_lowercase().starts_with(&language)).collect();
        keys.sort();
        if let Some(v) = keys.first().and_then(|k| map.get(*k)).filter(usable) {
            return v.clone();
        }
    }
    for key in ["en-US", "en"] {
        if let Some(v) = map.get(key).filter(usable) {
            return v.clone();
        }
    }
    fallback.to_string()
}

fn default_true() -> bool {
    true
}

fn default_string_type() -> String {
    "string".into()
}

fn default_filter_type() -> String {
    "dropdown".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyDefinition {
    pub entity: String,
    #[serde(default = "default_display_column")]
    pub display_column: String,
    /// Select through a picker dialog instead of a dropdown.
    #[serde(default)]
    pub picker: bool,
    #[serde(default)]
    pub multi_picker: bool,
}

fn default_display_column() -> String {
    "Id".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinDefinition {
    #[serde(rename = "type", default = "default_join_type")]
    pub type_: String,
    pub table: String,
    pub alias: String,
    pub on: String,
}

fn default_join_type() -> String {
    "left".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    #[serde(rename = "type", default = "default_string_type")]
    pub type_: String,
    #[serde(default)]
    pub identity: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub label_i18n: Option<HashMap<String, String>>,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default = "default_true")]
    pub editable: bool,
    /// SQL expression selected instead of `table.column` (computed or joined value).
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub foreign_key: Option<ForeignKeyDefinition>,
    #[serde(default)]
    pub hidden: bool,
}

impl Default for ColumnDefinition {
    fn default() -> Self {
        ColumnDefinition {
            type_: default_string_type(),
            identity: false,
            required: false,
            label: None,
            label_i18n: None,
            searchable: false,
            sortable: false,
            editable: true,
            expression: None,
            foreign_key: None,
            hidden: false,
        }
    }
}

impl ColumnDefinition {
    pub fn label(&self, key: &str, locale: &str) -> String {
        resolve_label(self.label_i18n.as_ref(), self.label.as_deref().unwrap_or(key), locale)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    #[serde(rename = "type", default = "default_string_type")]
    pub type_: String,
    #[serde(default)]
    pub identity: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub label_i18n: Option<HashMap<String, String>>,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub foreign_key: Option<ForeignKeyDefinition>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub hidden: bool,
}

impl Default for FormDefinition {
    fn default() -> Self {
        FormDefinition {
            type_: default_string_type(),
            identity: false,
            required: false,
            label: None,
            label_i18n: None,
            searchable: false,
            sortable: false,
            editable: true,
            expression: None,
            foreign_key: None,
            options: None,
            hidden: false,
        }
    }
}

impl FormDefinition {
    pub fn label(&self, key: &str, locale: &str) -> String {
        resolve_label(self.label_i18n.as_ref(), self.label.as_deref().unwrap_or(key), locale)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDefinition {
    #[serde(rename = "type", default = "default_filter_type")]
    pub type_: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub label_i18n: Option<HashMap<String, String>>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub foreign_key: Option<ForeignKeyDefinition>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

impl Default for FilterDefinition {
    fn default() -> Self {
        FilterDefinition {
            type_: default_filter_type(),
            label: None,
            label_i18n: None,
            expression: None,
            foreign_key: None,
            options: None,
        }
    }
}

impl FilterDefinition {
    pub fn label(&self, key: &str, locale: &str) -> String {
        resolve_label(self.label_i18n.as_ref(), self.label.as_deref().unwrap_or(key), locale)
    }

    pub fn kind(&self) -> FilterKind {
        FilterKind::parse(&self.type_)
    }
}

/// How a filter's request values turn into WHERE conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    /// `{key}_min` / `{key}_max`, numeric bounds.
    Range,
    /// `{key}_from` / `{key}_to`, date bounds.
    DateRange,
    /// Comma-joined values matched with IN.
    Multi,
    /// Single value matched with `=`.
    Exact,
}

impl FilterKind {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "range" => FilterKind::Range,
            "date-range" => FilterKind::DateRange,
            "checkbox" | "multi-select" => FilterKind::Multi,
            _ => FilterKind::Exact,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PagingMode {
    Numbered,
    Keyset,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagingDefinition {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_paging_mode", deserialize_with = "de_paging_mode")]
    pub mode: PagingMode,
    #[serde(default = "default_true")]
    pub enable_count: bool,
}

fn default_page_size() -> u32 {
    5
}

fn default_paging_mode() -> PagingMode {
    PagingMode::Numbered
}

/// Case-insensitive; anything other than keyset means numbered.
fn de_paging_mode<'de, D>(deserializer: D) -> Result<PagingMode, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(if s.eq_ignore_ascii_case("keyset") {
        PagingMode::Keyset
    } else {
        PagingMode::Numbered
    })
}

impl Default for PagingDefinition {
    fn default() -> Self {
        PagingDefinition {
            page_size: default_page_size(),
            mode: default_paging_mode(),
            enable_count: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormLayoutDefinition {
    #[serde(default = "default_form_columns")]
    pub columns: u32,
    #[serde(default)]
    pub order: Vec<String>,
}

fn default_form_columns() -> u32 {
    2
}

impl Default for FormLayoutDefinition {
    fn default() -> Self {
        FormLayoutDefinition {
            columns: default_form_columns(),
            order: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterLayoutDefinition {
    #[serde(default = "default_filter_columns")]
    pub columns: u32,
    #[serde(default)]
    pub order: Vec<String>,
}

fn default_filter_columns() -> u32 {
    4
}

impl Default for FilterLayoutDefinition {
    fn default() -> Self {
        FilterLayoutDefinition {
            columns: default_filter_columns(),
            order: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityLayoutDefinition {
    #[serde(default)]
    pub forms: FormLayoutDefinition,
    #[serde(default)]
    pub filters: FilterLayoutDefinition,
}

/// Confirmation prompts shown before saving; empty means no prompt.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationDefinition {
    #[serde(default)]
    pub create: Option<String>,
    #[serde(default)]
    pub update: Option<String>,
}

/// Hook names run around create and update.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityHooksDefinition {
    #[serde(default)]
    pub before_create: Option<String>,
    #[serde(default)]
    pub after_create: Option<String>,
    #[serde(default)]
    pub before_update: Option<String>,
    #[serde(default)]
    pub after_update: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityLinkDefinition {
    pub label: String,
    #[serde(default)]
    pub label_i18n: Option<HashMap<String, String>>,
    pub target_entity: String,
    /// Static query parameters (e.g. sort=Name).
    #[serde(default)]
    pub query: Option<IndexMap<String, String>>,
    /// Per-row parameters: target query param -> source row column.
    #[serde(default)]
    pub filter: Option<IndexMap<String, String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDefinition {
    pub table: String,
    pub key: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub display_name_i18n: Option<HashMap<String, String>>,
    #[serde(default)]
    pub joins: Vec<JoinDefinition>,
    #[serde(default)]
    pub forms: IndexMap<String, FormDefinition>,
    #[serde(default)]
    pub columns: IndexMap<String, ColumnDefinition>,
    #[serde(default)]
    pub paging: PagingDefinition,
    #[serde(default)]
    pub layout: EntityLayoutDefinition,
    #[serde(default)]
    pub soft_delete: bool,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub filters: IndexMap<String, FilterDefinition>,
    #[serde(default)]
    pub links: IndexMap<String, EntityLinkDefinition>,
    #[serde(default)]
    pub confirmation: Option<ConfirmationDefinition>,
    #[serde(default)]
    pub hooks: Option<EntityHooksDefinition>,
}

impl EntityDefinition {
    pub fn display_name(&self, fallback: &str, locale: &str) -> String {
        resolve_label(
            self.display_name_i18n.as_ref(),
            self.display_name.as_deref().unwrap_or(fallback),
            locale,
        )
    }

    pub fn ordered_forms(&self) -> Vec<(&str, &FormDefinition)> {
        ordered(&self.forms, &self.layout.forms.order)
    }

    pub fn ordered_filters(&self) -> Vec<(&str, &FilterDefinition)> {
        ordered(&self.filters, &self.layout.filters.order)
    }
}

/// Layout order first (unknown keys skipped), then remaining keys in declaration order.
fn ordered<'a, T>(map: &'a IndexMap<String, T>, order: &[String]) -> Vec<(&'a str, &'a T)> {
    let mut out: Vec<(&str, &T)> = Vec::with_capacity(map.len());
    for key in order {
        if let Some((k, v)) = map.get_key_value(key) {
            if !out.iter().any(|(seen, _)| *seen == k.as_str()) {
                out.push((k.as_str(), v));
            }
        }
    }
    for (k, v) in map {
        if !out.iter().any(|(seen, _)| *seen == k.as_str()) {
            out.push((k.as_str(), v));
        }
    }
    out
}

/// Root of an entity YAML file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EntityConfigRoot {
    #[serde(default)]
    pub entities: IndexMap<String, EntityDefinition>,
}
