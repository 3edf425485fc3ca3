//! Form text to typed SQL values, driven by the column `type`.

use crate::config::{ColumnDefinition, ResolvedEntity};
use crate::sql::SqlValue;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Per-field conversion failure; the message is shown next to the field.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    #[error("Required")]
    Required,
    #[error("Invalid integer")]
    InvalidInteger,
    #[error("Invalid long")]
    InvalidLong,
    #[error("Invalid decimal")]
    InvalidDecimal,
    #[error("Invalid double")]
    InvalidDouble,
    #[error("Invalid date")]
    InvalidDate,
    #[error("Invalid boolean")]
    InvalidBoolean,
    #[error("Invalid uuid")]
    InvalidUuid,
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    chrono::DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local())
}

/// Number with optional thousands separators (`1,234.50`); non-finite values are rejected.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Convert a non-blank value by type name. Unknown types pass through as text.
pub fn convert_typed(raw: &str, type_: &str) -> Result<SqlValue, FieldError> {
    let trimmed = raw.trim();
    match type_.to_lowercase().as_str() {
        "int" => trimmed
            .parse::<i32>()
            .map(|n| SqlValue::Int(n.into()))
            .map_err(|_| FieldError::InvalidInteger),
        "long" => trimmed.parse::<i64>().map(SqlValue::Int).map_err(|_| FieldError::InvalidLong),
        "decimal" => parse_number(trimmed).map(SqlValue::Float).ok_or(FieldError::InvalidDecimal),
        "double" => parse_number(trimmed).map(SqlValue::Float).ok_or(FieldError::InvalidDouble),
        "date" => parse_datetime(trimmed)
            .map(|dt| SqlValue::Text(dt.format("%Y-%m-%d").to_string()))
            .ok_or(FieldError::InvalidDate),
        "datetime" => parse_datetime(trimmed)
            .map(|dt| SqlValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
            .ok_or(FieldError::InvalidDate),
        "bool" => {
            if trimmed.eq_ignore_ascii_case("true") || trimmed == "on" {
                Ok(SqlValue::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Ok(SqlValue::Bool(false))
            } else {
                Err(FieldError::InvalidBoolean)
            }
        }
        "uuid" => uuid::Uuid::parse_str(trimmed)
            .map(|u| SqlValue::Text(u.hyphenated().to_string()))
            .map_err(|_| FieldError::InvalidUuid),
        _ => Ok(SqlValue::Text(raw.to_string())),
    }
}

/// Blank input is NULL unless the column is required (identity columns never are).
pub fn convert(input: Option<&str>, column: &ColumnDefinition) -> Result<SqlValue, FieldError> {
    match input.filter(|s| !s.trim().is_empty()) {
        None if column.required && !column.identity => Err(FieldError::Required),
        None => Ok(SqlValue::Null),
        Some(raw) => convert_typed(raw, &column.type_),
    }
}

#[derive(Debug, Default)]
pub struct ConvertedForm {
    pub values: HashMap<String, SqlValue>,
    pub errors: BTreeMap<String, String>,
}

impl ConvertedForm {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Convert submitted form fields for every writable column. An absent bool field means unchecked.
pub fn convert_form(entity: &ResolvedEntity, form: &HashMap<String, String>) -> ConvertedForm {
    let mut out = ConvertedForm::default();
    for (name, col) in &entity.def().columns {
        if col.identity || col.expression.is_some() {
            continue;
        }
        let raw = match form.get(name) {
            Some(v) => Some(v.as_str()),
            None if col.type_.eq_ignore_ascii_case("bool") => Some("false"),
            None => None,
        };
        match convert(raw, col) {
            Ok(v) => {
                out.values.insert(name.clone(), v);
            }
            Err(e) => {
                out.errors.insert(name.clone(), e.to_string());
            }
        }
    }
    out
}
