//! Dynamic CRUD execution over the sqlx `Any` driver.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::sql::{self, bind_all, row_to_json, ListRequest, QueryBuf, SqlDialect, SqlValue};
use serde_json::Value;
use sqlx::{AnyConnection, AnyPool, Row};
use std::collections::HashMap;
use std::sync::Arc;

/// Runs builder output for any entity. Reads use the pool; writes take a connection
/// so the caller owns the transaction.
#[derive(Clone)]
pub struct CrudRepository {
    pool: AnyPool,
    dialect: Arc<dyn SqlDialect>,
}

impl CrudRepository {
    pub fn new(pool: AnyPool, dialect: Arc<dyn SqlDialect>) -> Self {
        CrudRepository { pool, dialect }
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    pub async fn get_all(&self, entity: &ResolvedEntity, req: &ListRequest) -> Result<Vec<Value>, AppError> {
        let q = sql::select_list(entity, req, self.dialect());
        tracing::info!(
            entity = %entity.name(),
            page = req.page.max(1),
            page_size = req.effective_page_size(entity),
            sql = %q.sql(),
            "get_all"
        );
        self.fetch_rows(&q).await
    }

    pub async fn count(
        &self,
        entity: &ResolvedEntity,
        search: Option<&str>,
        filters: &HashMap<String, String>,
    ) -> Result<i64, AppError> {
        let q = sql::count(entity, search, filters, self.dialect());
        tracing::info!(entity = %entity.name(), sql = %q.sql(), "count");
        let row = bind_all(q.sql(), q.params()).fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    pub async fn get_by_id(&self, entity: &ResolvedEntity, id: &SqlValue) -> Result<Option<Value>, AppError> {
        let q = sql::select_by_id(entity, id.clone(), self.dialect());
        tracing::info!(entity = %entity.name(), id = %id, sql = %q.sql(), "get_by_id");
        let row = bind_all(q.sql(), q.params()).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    /// Returns the generated key when the backend reports one.
    pub async fn insert(
        &self,
        conn: &mut AnyConnection,
        entity: &ResolvedEntity,
        values: &HashMap<String, SqlValue>,
    ) -> Result<Option<i64>, AppError> {
        let q = sql::insert(entity, values, self.dialect());
        tracing::info!(entity = %entity.name(), sql = %q.sql(), "insert");
        if self.dialect().returning_clause(entity.key()).is_some() {
            let row = bind_all(q.sql(), q.params()).fetch_one(&mut *conn).await?;
            let id = row.try_get::<i64, _>(0).ok().or_else(|| row.try_get::<i32, _>(0).ok().map(i64::from));
            return Ok(id);
        }
        let result = bind_all(q.sql(), q.params()).execute(&mut *conn).await?;
        Ok(result.last_insert_id())
    }

    /// Rows affected; 0 when no editable field was supplied.
    pub async fn update(
        &self,
        conn: &mut AnyConnection,
        entity: &ResolvedEntity,
        id: &SqlValue,
        values: &HashMap<String, SqlValue>,
    ) -> Result<u64, AppError> {
        let Some(q) = sql::update(entity, id.clone(), values, self.dialect()) else {
            tracing::info!(entity = %entity.name(), id = %id, "update skipped: no editable fields");
            return Ok(0);
        };
        tracing::info!(entity = %entity.name(), id = %id, sql = %q.sql(), "update");
        let result = bind_all(q.sql(), q.params()).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, conn: &mut AnyConnection, entity: &ResolvedEntity, id: &SqlValue) -> Result<u64, AppError> {
        let q = sql::delete(entity, id.clone(), self.dialect());
        tracing::info!(
            entity = %entity.name(),
            id = %id,
            soft = entity.def().soft_delete,
            sql = %q.sql(),
            "delete"
        );
        let result = bind_all(q.sql(), q.params()).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    /// `{ id, label }` rows of `target` for dropdowns.
    pub async fn foreign_key_options(&self, target: &ResolvedEntity, display_column: &str) -> Result<Vec<Value>, AppError> {
        let q = sql::foreign_key_options(target, display_column, self.dialect());
        tracing::debug!(entity = %target.name(), sql = %q.sql(), "foreign_key_options");
        self.fetch_rows(&q).await
    }

    pub(crate) async fn fetch_rows(&self, q: &QueryBuf<'_>) -> Result<Vec<Value>, AppError> {
        let rows = bind_all(q.sql(), q.params()).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    /// First column of the first row, or null.
    pub(crate) async fn fetch_scalar(&self, q: &QueryBuf<'_>) -> Result<Value, AppError> {
        let row = bind_all(q.sql(), q.params()).fetch_optional(&self.pool).await?;
        Ok(row
            .map(|r| row_to_json(&r))
            .and_then(|v| match v {
                Value::Object(map) => map.into_iter().next().map(|(_, v)| v),
                _ => None,
            })
            .unwrap_or(Value::Null))
    }
}
