//! Per-database SQL syntax: placeholders, pagination, string concatenation.

use crate::error::ConfigError;
use crate::sql::builder::QueryBuf;
use crate::sql::value::SqlValue;
use std::str::FromStr;
use std::sync::Arc;

pub trait SqlDialect: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Placeholder for the n-th bound parameter (1-based).
    fn placeholder(&self, n: usize) -> String;

    fn concat_operator(&self) -> &'static str;

    /// Page-number pagination. `default_order_by` is used when the dialect needs an ORDER BY and the query has none.
    fn append_numbered_pagination(&self, q: &mut QueryBuf<'_>, page_size: u32, offset: u64, default_order_by: &str);

    /// Row cap for queries that already carry an ORDER BY (keyset pages, charts).
    fn append_limit(&self, q: &mut QueryBuf<'_>, limit: u32);

    /// Column definition for an auto-increment integer primary key.
    fn identity_column_ddl(&self) -> &'static str;

    fn create_table_if_missing(&self, table: &str, columns: &str) -> String {
        format!("CREATE TABLE IF NOT EXISTS {} ({})", table, columns)
    }

    /// Wrap a selected expression of the given column type so it decodes through the `Any` driver.
    /// `text` forces a string result.
    fn read_expr(&self, expr: &str, _type_: &str) -> String {
        expr.to_string()
    }

    /// Wrap a bound placeholder compared with or written to a column of the given type.
    fn bind_expr(&self, placeholder: &str, _type_: &str) -> String {
        placeholder.to_string()
    }

    /// Result column alias as the row should report it.
    fn alias(&self, name: &str) -> String {
        name.to_string()
    }

    /// By-id reads list the declared columns instead of `*`.
    fn typed_reads(&self) -> bool {
        false
    }

    /// Suffix on INSERT that returns the generated key as a row.
    fn returning_clause(&self, _key: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, n: usize) -> String {
        format!("?{}", n)
    }

    fn concat_operator(&self) -> &'static str {
        "||"
    }

    fn append_numbered_pagination(&self, q: &mut QueryBuf<'_>, page_size: u32, offset: u64, _default_order_by: &str) {
        let size = q.push_param(SqlValue::Int(page_size.into()));
        let off = q.push_param(SqlValue::Int(offset as i64));
        q.push(&format!(" LIMIT {} OFFSET {}", size, off));
    }

    fn append_limit(&self, q: &mut QueryBuf<'_>, limit: u32) {
        let size = q.push_param(SqlValue::Int(limit.into()));
        q.push(&format!(" LIMIT {}", size));
    }

    fn identity_column_ddl(&self) -> &'static str {
        "INTEGER PRIMARY KEY AUTOINCREMENT"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, n: usize) -> String {
        format!("${}", n)
    }

    fn concat_operator(&self) -> &'static str {
        "||"
    }

    fn append_numbered_pagination(&self, q: &mut QueryBuf<'_>, page_size: u32, offset: u64, _default_order_by: &str) {
        let size = q.push_param(SqlValue::Int(page_size.into()));
        let off = q.push_param(SqlValue::Int(offset as i64));
        q.push(&format!(" LIMIT {} OFFSET {}", size, off));
    }

    fn append_limit(&self, q: &mut QueryBuf<'_>, limit: u32) {
        let size = q.push_param(SqlValue::Int(limit.into()));
        q.push(&format!(" LIMIT {}", size));
    }

    fn identity_column_ddl(&self) -> &'static str {
        "BIGSERIAL PRIMARY KEY"
    }

    // The Any driver has no DATE, TIMESTAMP, NUMERIC or UUID support.
    fn read_expr(&self, expr: &str, type_: &str) -> String {
        match type_.to_lowercase().as_str() {
            "date" | "datetime" | "uuid" | "text" => format!("CAST({} AS TEXT)", expr),
            "decimal" | "double" => format!("CAST({} AS DOUBLE PRECISION)", expr),
            _ => expr.to_string(),
        }
    }

    fn bind_expr(&self, placeholder: &str, type_: &str) -> String {
        match type_.to_lowercase().as_str() {
            "date" => format!("CAST({} AS DATE)", placeholder),
            "datetime" => format!("CAST({} AS TIMESTAMP)", placeholder),
            "uuid" => format!("CAST({} AS UUID)", placeholder),
            "decimal" => format!("CAST({} AS NUMERIC)", placeholder),
            // Null binds arrive as text.
            "int" | "long" => format!("CAST({} AS BIGINT)", placeholder),
            "double" => format!("CAST({} AS DOUBLE PRECISION)", placeholder),
            "bool" => format!("CAST({} AS BOOLEAN)", placeholder),
            _ => placeholder.to_string(),
        }
    }

    /// Unquoted names fold to lower case.
    fn alias(&self, name: &str) -> String {
        format!("\"{}\"", name)
    }

    fn typed_reads(&self) -> bool {
        true
    }

    fn returning_clause(&self, key: &str) -> Option<String> {
        Some(format!(" RETURNING {}", key))
    }
}

/// SQL Server: OFFSET / FETCH requires an ORDER BY.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServerDialect;

impl SqlDialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn placeholder(&self, n: usize) -> String {
        format!("@p{}", n)
    }

    fn concat_operator(&self) -> &'static str {
        "+"
    }

    fn append_numbered_pagination(&self, q: &mut QueryBuf<'_>, page_size: u32, offset: u64, default_order_by: &str) {
        if !q.has_order_by() {
            q.order_by(default_order_by, "ASC");
        }
        let off = q.push_param(SqlValue::Int(offset as i64));
        let size = q.push_param(SqlValue::Int(page_size.into()));
        q.push(&format!(" OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", off, size));
    }

    fn append_limit(&self, q: &mut QueryBuf<'_>, limit: u32) {
        let size = q.push_param(SqlValue::Int(limit.into()));
        q.push(&format!(" OFFSET 0 ROWS FETCH NEXT {} ROWS ONLY", size));
    }

    fn identity_column_ddl(&self) -> &'static str {
        "INT IDENTITY(1,1) PRIMARY KEY"
    }

    fn create_table_if_missing(&self, table: &str, columns: &str) -> String {
        format!("IF OBJECT_ID(N'{0}', N'U') IS NULL CREATE TABLE {0} ({1})", table, columns)
    }
}

/// Database backend selected by configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatabaseProvider {
    Sqlite,
    Postgres,
    SqlServer,
}

impl FromStr for DatabaseProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "sqlite" => Ok(DatabaseProvider::Sqlite),
            "postgres" | "postgresql" => Ok(DatabaseProvider::Postgres),
            "sqlserver" | "mssql" => Ok(DatabaseProvider::SqlServer),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl DatabaseProvider {
    pub fn dialect(self) -> Arc<dyn SqlDialect> {
        match self {
            DatabaseProvider::Sqlite => Arc::new(SqliteDialect),
            DatabaseProvider::Postgres => Arc::new(PostgresDialect),
            DatabaseProvider::SqlServer => Arc::new(SqlServerDialect),
        }
    }

    /// Whether the bundled sqlx `Any` driver set can execute against this backend.
    pub fn has_driver(self) -> bool {
        !matches!(self, DatabaseProvider::SqlServer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_numbered_uses_limit_offset() {
        let d = SqliteDialect;
        let mut q = QueryBuf::new(&d);
        q.push("SELECT * FROM Customer");
        d.append_numbered_pagination(&mut q, 10, 20, "Customer.CustomerId");
        assert_eq!(q.sql(), "SELECT * FROM Customer LIMIT ?1 OFFSET ?2");
        assert_eq!(q.params(), &[SqlValue::Int(10), SqlValue::Int(20)]);
    }

    #[test]
    fn sqlserver_numbered_adds_default_order() {
        let d = SqlServerDialect;
        let mut q = QueryBuf::new(&d);
        q.push("SELECT * FROM Customer");
        d.append_numbered_pagination(&mut q, 10, 0, "Customer.CustomerId");
        assert_eq!(
            q.sql(),
            "SELECT * FROM Customer ORDER BY Customer.CustomerId ASC OFFSET @p1 ROWS FETCH NEXT @p2 ROWS ONLY"
        );
        assert_eq!(q.params(), &[SqlValue::Int(0), SqlValue::Int(10)]);
    }

    #[test]
    fn sqlserver_keeps_existing_order() {
        let d = SqlServerDialect;
        let mut q = QueryBuf::new(&d);
        q.push("SELECT * FROM Customer");
        q.order_by("Customer.LastName", "DESC");
        d.append_numbered_pagination(&mut q, 5, 5, "Customer.CustomerId");
        assert!(q.sql().contains("ORDER BY Customer.LastName DESC OFFSET"));
        assert!(!q.sql().contains("CustomerId"));
    }

    #[test]
    fn limit_forms() {
        let d = SqlServerDialect;
        let mut q = QueryBuf::new(&d);
        q.push("SELECT 1");
        d.append_limit(&mut q, 3);
        assert_eq!(q.sql(), "SELECT 1 OFFSET 0 ROWS FETCH NEXT @p1 ROWS ONLY");

        let d = PostgresDialect;
        let mut q = QueryBuf::new(&d);
        q.push("SELECT 1");
        d.append_limit(&mut q, 3);
        assert_eq!(q.sql(), "SELECT 1 LIMIT $1");
    }

    #[test]
    fn create_table_forms() {
        assert_eq!(
            SqliteDialect.create_table_if_missing("AuditLog", "Id INTEGER"),
            "CREATE TABLE IF NOT EXISTS AuditLog (Id INTEGER)"
        );
        assert!(SqlServerDialect
            .create_table_if_missing("AuditLog", "Id INT")
            .starts_with("IF OBJECT_ID(N'AuditLog', N'U') IS NULL CREATE TABLE AuditLog"));
    }

    #[test]
    fn postgres_wraps_types_the_any_driver_cannot_carry() {
        let d = PostgresDialect;
        assert_eq!(d.read_expr("Invoice.InvoiceDate", "date"), "CAST(Invoice.InvoiceDate AS TEXT)");
        assert_eq!(d.read_expr("SUM(Total)", "double"), "CAST(SUM(Total) AS DOUBLE PRECISION)");
        assert_eq!(d.read_expr("Invoice.InvoiceId", "int"), "Invoice.InvoiceId");
        assert_eq!(d.bind_expr("$1", "Date"), "CAST($1 AS DATE)");
        assert_eq!(d.bind_expr("$2", "datetime"), "CAST($2 AS TIMESTAMP)");
        assert_eq!(d.bind_expr("$3", "string"), "$3");
        assert_eq!(d.bind_expr("$4", "int"), "CAST($4 AS BIGINT)");
        assert_eq!(d.alias("InvoiceId"), "\"InvoiceId\"");
        assert_eq!(d.returning_clause("InvoiceId").as_deref(), Some(" RETURNING InvoiceId"));

        let s = SqliteDialect;
        assert_eq!(s.read_expr("Invoice.InvoiceDate", "date"), "Invoice.InvoiceDate");
        assert_eq!(s.bind_expr("?1", "date"), "?1");
        assert_eq!(s.alias("InvoiceId"), "InvoiceId");
        assert!(s.returning_clause("InvoiceId").is_none());
        assert!(!SqlServerDialect.typed_reads());
    }

    #[test]
    fn concat_operators() {
        assert_eq!(SqliteDialect.concat_operator(), "||");
        assert_eq!(SqlServerDialect.concat_operator(), "+");
    }

    #[test]
    fn provider_parse() {
        assert_eq!("SQLite".parse::<DatabaseProvider>().unwrap(), DatabaseProvider::Sqlite);
        assert_eq!("".parse::<DatabaseProvider>().unwrap(), DatabaseProvider::Sqlite);
        assert_eq!("sqlserver".parse::<DatabaseProvider>().unwrap(), DatabaseProvider::SqlServer);
        assert!("oracle".parse::<DatabaseProvider>().is_err());
        assert!(!DatabaseProvider::SqlServer.has_driver());
        assert_eq!(DatabaseProvider::Postgres.dialect().name(), "postgres");
    }
}
