//! AuditLog table: one row per create, update and delete, written inside the caller's transaction.

use crate::error::AppError;
use crate::sql::{bind_all, SqlDialect, SqlValue};
use sqlx::{AnyConnection, AnyPool};

pub const AUDIT_TABLE: &str = "AuditLog";

#[derive(Clone, Debug)]
pub struct AuditEntry {
    pub action: &'static str,
    pub entity: Option<String>,
    pub detail: Option<String>,
    pub user: Option<String>,
}

impl AuditEntry {
    pub fn new(action: &'static str, entity: &str, detail: impl Into<String>, user: Option<&str>) -> Self {
        AuditEntry {
            action,
            entity: Some(entity.to_string()),
            detail: Some(detail.into()),
            user: user.map(str::to_string),
        }
    }
}

/// Create the audit table when it does not exist. Run once at startup.
pub async fn ensure_audit_table(pool: &AnyPool, dialect: &dyn SqlDialect) -> Result<(), AppError> {
    let columns = format!(
        "Id {}, UserName TEXT NULL, Action TEXT NOT NULL, Entity TEXT NULL, Detail TEXT NULL, CreatedAt TEXT NOT NULL",
        dialect.identity_column_ddl()
    );
    let sql = dialect.create_table_if_missing(AUDIT_TABLE, &columns);
    tracing::debug!(sql = %sql, "ensure audit table");
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

pub async fn write(conn: &mut AnyConnection, dialect: &dyn SqlDialect, entry: &AuditEntry) -> Result<(), AppError> {
    let created_at = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let to_value = |v: &Option<String>| v.clone().map(SqlValue::Text).unwrap_or(SqlValue::Null);
    let params = vec![
        to_value(&entry.user),
        SqlValue::text(entry.action),
        to_value(&entry.entity),
        to_value(&entry.detail),
        SqlValue::Text(created_at),
    ];
    let placeholders: Vec<String> = (1..=params.len()).map(|n| dialect.placeholder(n)).collect();
    let sql = format!(
        "INSERT INTO {} (UserName, Action, Entity, Detail, CreatedAt) VALUES ({})",
        AUDIT_TABLE,
        placeholders.join(", ")
    );
    bind_all(&sql, &params).execute(&mut *conn).await?;
    tracing::info!(
        action = entry.action,
        entity = entry.entity.as_deref().unwrap_or(""),
        user = entry.user.as_deref().unwrap_or(""),
        detail = entry.detail.as_deref().unwrap_or(""),
        "audit"
    );
    Ok(())
}
