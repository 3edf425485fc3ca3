//! Metadata validation: every config-sourced SQL fragment passes an allow-list before use.

use crate::config::dashboard::{Aggregate, DashboardConfig};
use crate::config::types::EntityDefinition;
use crate::error::ConfigError;
use regex::Regex;
use std::sync::OnceLock;

const JOIN_TYPES: &[&str] = &["left", "inner", "right"];

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"))
}

fn expression_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\s,()+\-*/%<>=!'|]+$").expect("expression regex"))
}

fn has_unsafe_token(value: &str) -> bool {
    value.contains(';') || value.contains("--") || value.contains("/*") || value.contains("*/")
}

pub fn is_identifier(value: &str) -> bool {
    identifier_re().is_match(value)
}

pub fn is_expression(value: &str) -> bool {
    !has_unsafe_token(value) && expression_re().is_match(value)
}

pub fn ensure_identifier(value: &str, field: impl Into<String>) -> Result<(), ConfigError> {
    if is_identifier(value) {
        Ok(())
    } else {
        Err(ConfigError::UnsafeIdentifier {
            field: field.into(),
            value: value.to_string(),
        })
    }
}

pub fn ensure_expression(value: &str, field: impl Into<String>) -> Result<(), ConfigError> {
    if is_expression(value) {
        Ok(())
    } else {
        Err(ConfigError::UnsafeExpression {
            field: field.into(),
            value: value.to_string(),
        })
    }
}

/// Validate one entity's identifiers, expressions and join types.
pub fn validate_entity(name: &str, meta: &EntityDefinition) -> Result<(), ConfigError> {
    ensure_identifier(&meta.table, format!("{}.table", name))?;
    ensure_identifier(&meta.key, format!("{}.key", name))?;

    for (key, col) in &meta.columns {
        ensure_identifier(key, format!("{}.column", name))?;
        if let Some(expr) = &col.expression {
            ensure_expression(expr, format!("{}.columnExpression.{}", name, key))?;
        }
        if let Some(fk) = &col.foreign_key {
            ensure_identifier(&fk.display_column, format!("{}.column.fkDisplayColumn.{}", name, key))?;
        }
    }

    for (key, form) in &meta.forms {
        ensure_identifier(key, format!("{}.form", name))?;
        if let Some(expr) = &form.expression {
            ensure_expression(expr, format!("{}.formExpression.{}", name, key))?;
        }
        if let Some(fk) = &form.foreign_key {
            ensure_identifier(&fk.display_column, format!("{}.form.fkDisplayColumn.{}", name, key))?;
        }
    }

    for (key, filter) in &meta.filters {
        ensure_identifier(key, format!("{}.filter", name))?;
        if let Some(expr) = &filter.expression {
            ensure_expression(expr, format!("{}.filterExpression.{}", name, key))?;
        }
        if let Some(fk) = &filter.foreign_key {
            ensure_identifier(&fk.display_column, format!("{}.filter.fkDisplayColumn.{}", name, key))?;
        }
    }

    for join in &meta.joins {
        if !JOIN_TYPES.iter().any(|t| t.eq_ignore_ascii_case(&join.type_)) {
            return Err(ConfigError::UnsafeJoinType {
                field: format!("{}.joinType", name),
                value: join.type_.clone(),
            });
        }
        ensure_identifier(&join.table, format!("{}.joinTable", name))?;
        ensure_identifier(&join.alias, format!("{}.joinAlias", name))?;
        ensure_expression(&join.on, format!("{}.joinOn", name))?;
    }

    Ok(())
}

/// Validate dashboard fragments. Entity references are checked by the caller against the catalog.
pub fn validate_dashboard(config: &DashboardConfig) -> Result<(), ConfigError> {
    for (i, stat) in config.stats.iter().enumerate() {
        if Aggregate::parse(&stat.aggregate).is_none() {
            tracing::warn!(index = i, aggregate = %stat.aggregate, "dashboard stat has unknown aggregate; it will be skipped");
        }
        if let Some(col) = &stat.column {
            ensure_expression(col, format!("dashboard.stats[{}].column", i))?;
        }
        if let Some(filter) = &stat.filter {
            ensure_expression(filter, format!("dashboard.stats[{}].filter", i))?;
        }
    }

    for (i, chart) in config.charts.iter().enumerate() {
        if let Some(col) = &chart.value_column {
            ensure_expression(col, format!("dashboard.charts[{}].valueColumn", i))?;
        }
        if let Some(expr) = &chart.group_expression {
            ensure_expression(expr, format!("dashboard.charts[{}].groupExpression", i))?;
        }
        if let Some(key) = &chart.label_join_key {
            ensure_identifier(key, format!("dashboard.charts[{}].labelJoinKey", i))?;
        }
        if let Some(display) = &chart.label_join_display {
            ensure_identifier(display, format!("dashboard.charts[{}].labelJoinDisplay", i))?;
        }
        if let Some(filter) = &chart.filter {
            ensure_expression(filter, format!("dashboard.charts[{}].filter", i))?;
        }
    }

    Ok(())
}
