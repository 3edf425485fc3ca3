//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a resolved entity.
//!
//! Identifiers and expressions come from validated config only; request values are
//! always bound as parameters.

use crate::config::{
    Aggregate, DashboardChartDefinition, DashboardStatDefinition, FilterKind, PagingMode, ResolvedEntity,
};
use crate::service::convert::{convert_typed, parse_number};
use crate::sql::dialect::SqlDialect;
use crate::sql::value::SqlValue;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Soft-delete flag column expected on tables with `softDelete: true`.
pub const SOFT_DELETE_COLUMN: &str = "IsDeleted";

/// Upper bound on rows per page, whether requested or configured.
pub const MAX_PAGE_SIZE: u32 = 1000;

pub struct QueryBuf<'d> {
    dialect: &'d dyn SqlDialect,
    sql: String,
    params: Vec<SqlValue>,
    has_order_by: bool,
}

impl<'d> QueryBuf<'d> {
    pub fn new(dialect: &'d dyn SqlDialect) -> Self {
        QueryBuf {
            dialect,
            sql: String::new(),
            params: Vec::new(),
            has_order_by: false,
        }
    }

    pub fn push(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
    }

    /// Bind a value and return its placeholder text.
    pub fn push_param(&mut self, v: SqlValue) -> String {
        self.params.push(v);
        self.dialect.placeholder(self.params.len())
    }

    pub fn order_by(&mut self, expr: &str, direction: &str) {
        self.sql.push_str(&format!(" ORDER BY {} {}", expr, direction));
        self.has_order_by = true;
    }

    pub fn has_order_by(&self) -> bool {
        self.has_order_by
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn dialect(&self) -> &'d dyn SqlDialect {
        self.dialect
    }

    fn push_where(&mut self, conditions: &[String]) {
        if !conditions.is_empty() {
            self.sql.push_str(" WHERE ");
            self.sql.push_str(&conditions.join(" AND "));
        }
    }
}

impl std::fmt::Debug for QueryBuf<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuf")
            .field("dialect", &self.dialect.name())
            .field("sql", &self.sql)
            .field("params", &self.params)
            .finish()
    }
}

/// List request after query-string parsing.
#[derive(Clone, Debug, Default)]
pub struct ListRequest {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub dir: Option<String>,
    /// Filter parameters keyed as sent (`Total_min`, `InvoiceDate_from`, `Country`, ...).
    pub filters: HashMap<String, String>,
    /// 1-based; 0 is treated as 1.
    pub page: u32,
    /// Overrides `paging.pageSize` when set.
    pub page_size: Option<u32>,
    pub cursor: Option<String>,
    /// Ask for one row past the page so the caller can tell whether more exist.
    pub fetch_one_extra: bool,
}

impl ListRequest {
    pub fn effective_page_size(&self, entity: &ResolvedEntity) -> u32 {
        self.page_size
            .filter(|n| *n > 0)
            .unwrap_or(entity.def().paging.page_size)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

fn soft_delete_guard(entity: &ResolvedEntity) -> String {
    let col = entity.qualified(SOFT_DELETE_COLUMN);
    format!("({} = 0 OR {} IS NULL)", col, col)
}

fn non_blank<'a>(filters: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    filters.get(key).map(String::as_str).filter(|v| !v.trim().is_empty())
}

/// Lenient date parse for filter bounds: date, date-time, or RFC 3339.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    chrono::DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive())
}

/// `FROM table` followed by each configured join.
pub fn build_from_clause(entity: &ResolvedEntity) -> String {
    let mut parts = vec![format!("FROM {}", entity.table())];
    for join in &entity.def().joins {
        parts.push(format!(
            "{} JOIN {} {} ON {}",
            join.type_.to_uppercase(),
            join.table,
            join.alias,
            join.on
        ));
    }
    parts.join(" ")
}

/// WHERE conditions from filters (declaration order), search, and soft delete. Params are pushed onto `q`.
pub fn build_where(
    entity: &ResolvedEntity,
    search: Option<&str>,
    filters: &HashMap<String, String>,
    q: &mut QueryBuf<'_>,
) -> Vec<String> {
    let mut conditions = Vec::new();
    let dialect = q.dialect();

    for (key, filter) in &entity.def().filters {
        let expr = filter.expression.clone().unwrap_or_else(|| entity.qualified(key));
        match filter.kind() {
            FilterKind::Range => {
                for (suffix, op) in [("_min", ">="), ("_max", "<=")] {
                    let bound = non_blank(filters, &format!("{}{}", key, suffix)).and_then(|raw| parse_number(raw.trim()));
                    if let Some(n) = bound {
                        let p = q.push_param(SqlValue::Float(n));
                        conditions.push(format!("{} {} {}", expr, op, p));
                    }
                }
            }
            FilterKind::DateRange => {
                for (suffix, op) in [("_from", ">="), ("_to", "<=")] {
                    if let Some(date) = non_blank(filters, &format!("{}{}", key, suffix)).and_then(parse_date) {
                        let p = q.push_param(SqlValue::Text(date.format("%Y-%m-%d").to_string()));
                        let p = dialect.bind_expr(&p, "date");
                        conditions.push(format!("{} {} {}", expr, op, p));
                    }
                }
            }
            FilterKind::Multi => {
                let Some(raw) = non_blank(filters, key) else { continue };
                let placeholders: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| q.push_param(SqlValue::text(s)))
                    .collect();
                if !placeholders.is_empty() {
                    conditions.push(format!("{} IN ({})", expr, placeholders.join(", ")));
                }
            }
            FilterKind::Exact => {
                let Some(raw) = non_blank(filters, key) else { continue };
                let typed = entity
                    .column(key)
                    .and_then(|col| convert_typed(raw, &col.type_).ok().map(|v| (v, col.type_.as_str())));
                let p = match typed {
                    Some((value, type_)) => {
                        let p = q.push_param(value);
                        dialect.bind_expr(&p, type_)
                    }
                    None => q.push_param(SqlValue::text(raw)),
                };
                conditions.push(format!("{} = {}", expr, p));
            }
        }
    }

    if let Some(search) = search.filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search);
        let likes: Vec<String> = entity
            .def()
            .columns
            .iter()
            .filter(|(_, c)| c.searchable)
            .map(|(key, c)| {
                let expr = c.expression.clone().unwrap_or_else(|| entity.qualified(key));
                let p = q.push_param(SqlValue::text(pattern.clone()));
                format!("{} LIKE {}", expr, p)
            })
            .collect();
        if !likes.is_empty() {
            conditions.push(format!("({})", likes.join(" OR ")));
        }
    }

    if entity.def().soft_delete {
        conditions.push(soft_delete_guard(entity));
    }

    conditions
}

fn select_item(expr: &str, key: &str, type_: &str, computed: bool, dialect: &dyn SqlDialect) -> String {
    let read = dialect.read_expr(expr, type_);
    let alias = dialect.alias(key);
    if computed || read != expr || alias != key {
        format!("{} AS {}", read, alias)
    } else {
        read
    }
}

fn column_items(entity: &ResolvedEntity, dialect: &dyn SqlDialect) -> Vec<String> {
    entity
        .def()
        .columns
        .iter()
        .map(|(key, c)| match &c.expression {
            Some(expr) => select_item(expr, key, &c.type_, true, dialect),
            None => select_item(&entity.qualified(key), key, &c.type_, false, dialect),
        })
        .collect()
}

fn select_columns(entity: &ResolvedEntity, dialect: &dyn SqlDialect) -> String {
    if entity.def().columns.is_empty() {
        return format!("{}.*", entity.table());
    }
    column_items(entity, dialect).join(", ")
}

/// `left = p`, with text ids cast to the key column type.
fn key_condition(entity: &ResolvedEntity, left: &str, id: SqlValue, q: &mut QueryBuf<'_>) -> String {
    let is_text = matches!(id, SqlValue::Text(_));
    let p = q.push_param(id);
    let p = match entity.column(entity.key()) {
        Some(col) if is_text => q.dialect().bind_expr(&p, &col.type_),
        _ => p,
    };
    format!("{} = {}", left, p)
}

/// Paged list query. Keyset or numbered pagination follows `paging.mode`.
pub fn select_list<'d>(entity: &ResolvedEntity, req: &ListRequest, dialect: &'d dyn SqlDialect) -> QueryBuf<'d> {
    let mut q = QueryBuf::new(dialect);
    q.push(&format!("SELECT {} {}", select_columns(entity, dialect), build_from_clause(entity)));
    let mut conditions = build_where(entity, req.search.as_deref(), &req.filters, &mut q);

    let page_size = req.effective_page_size(entity);
    let fetch = if req.fetch_one_extra { page_size + 1 } else { page_size };
    let key = entity.qualified(entity.key());

    match entity.def().paging.mode {
        PagingMode::Keyset => {
            if let Some(cursor) = req.cursor.as_deref().and_then(|c| c.trim().parse::<i64>().ok()) {
                let p = q.push_param(SqlValue::Int(cursor));
                conditions.push(format!("{} > {}", key, p));
            }
            q.push_where(&conditions);
            q.order_by(&key, "ASC");
            dialect.append_limit(&mut q, fetch);
        }
        PagingMode::Numbered => {
            q.push_where(&conditions);
            if let Some(sort) = req.sort.as_deref().filter(|s| !s.trim().is_empty()) {
                if let Some(col) = entity.column(sort).filter(|c| c.sortable) {
                    let expr = col.expression.clone().unwrap_or_else(|| entity.qualified(sort));
                    let direction = match req.dir.as_deref() {
                        Some(d) if d.eq_ignore_ascii_case("desc") => "DESC",
                        _ => "ASC",
                    };
                    q.order_by(&expr, direction);
                }
            }
            let page = req.page.max(1);
            let offset = u64::from(page - 1) * u64::from(page_size);
            dialect.append_numbered_pagination(&mut q, fetch, offset, &key);
        }
    }
    q
}

pub fn count<'d>(
    entity: &ResolvedEntity,
    search: Option<&str>,
    filters: &HashMap<String, String>,
    dialect: &'d dyn SqlDialect,
) -> QueryBuf<'d> {
    let mut q = QueryBuf::new(dialect);
    q.push(&format!("SELECT COUNT(*) {}", build_from_clause(entity)));
    let conditions = build_where(entity, search, filters, &mut q);
    q.push_where(&conditions);
    q
}

/// Whole row by key. Dialects with typed reads list declared columns and form fields instead of `*`.
pub fn select_by_id<'d>(entity: &ResolvedEntity, id: SqlValue, dialect: &'d dyn SqlDialect) -> QueryBuf<'d> {
    let mut q = QueryBuf::new(dialect);
    let condition = key_condition(entity, &entity.qualified(entity.key()), id, &mut q);
    if dialect.typed_reads() {
        let mut items = column_items(entity, dialect);
        items.extend(
            entity
                .def()
                .forms
                .iter()
                .filter(|(key, _)| entity.column(key).is_none())
                .map(|(key, f)| select_item(&entity.qualified(key), key, &f.type_, false, dialect)),
        );
        if items.is_empty() {
            items.push(format!("{}.*", entity.table()));
        }
        q.push(&format!("SELECT {} {} WHERE {}", items.join(", "), build_from_clause(entity), condition));
    } else {
        q.push(&format!("SELECT * FROM {} WHERE {}", entity.table(), condition));
    }
    if entity.def().soft_delete {
        q.push(&format!(" AND {}", soft_delete_guard(entity)));
    }
    q
}

/// INSERT over non-identity, non-expression columns; absent values bind NULL.
pub fn insert<'d>(
    entity: &ResolvedEntity,
    values: &HashMap<String, SqlValue>,
    dialect: &'d dyn SqlDialect,
) -> QueryBuf<'d> {
    let mut q = QueryBuf::new(dialect);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (key, col) in &entity.def().columns {
        if col.identity || col.expression.is_some() {
            continue;
        }
        let v = values.get(key).cloned().unwrap_or(SqlValue::Null);
        let p = q.push_param(v);
        placeholders.push(dialect.bind_expr(&p, &col.type_));
        cols.push(key.as_str());
    }
    q.push(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        entity.table(),
        cols.join(", "),
        placeholders.join(", ")
    ));
    if let Some(returning) = dialect.returning_clause(entity.key()) {
        q.push(&returning);
    }
    q
}

/// Whether `field` is an editable, non-identity form field, i.e. one an UPDATE would write.
pub fn is_updatable(entity: &ResolvedEntity, field: &str) -> bool {
    entity.def().forms.get(field).is_some_and(|f| !f.identity && f.editable)
}

/// UPDATE editable, non-identity form fields present in `values`. `None` when nothing would be set.
pub fn update<'d>(
    entity: &ResolvedEntity,
    id: SqlValue,
    values: &HashMap<String, SqlValue>,
    dialect: &'d dyn SqlDialect,
) -> Option<QueryBuf<'d>> {
    let mut q = QueryBuf::new(dialect);
    let mut sets = Vec::new();
    for (key, form) in &entity.def().forms {
        if !is_updatable(entity, key) {
            continue;
        }
        let Some(v) = values.get(key) else { continue };
        let type_ = entity.column(key).map_or(form.type_.as_str(), |c| c.type_.as_str());
        let p = q.push_param(v.clone());
        sets.push(format!("{} = {}", key, dialect.bind_expr(&p, type_)));
    }
    if sets.is_empty() {
        return None;
    }
    let condition = key_condition(entity, entity.key(), id, &mut q);
    q.push(&format!("UPDATE {} SET {} WHERE {}", entity.table(), sets.join(", "), condition));
    Some(q)
}

/// Soft delete sets the flag; otherwise the row is removed.
pub fn delete<'d>(entity: &ResolvedEntity, id: SqlValue, dialect: &'d dyn SqlDialect) -> QueryBuf<'d> {
    let mut q = QueryBuf::new(dialect);
    let condition = key_condition(entity, entity.key(), id, &mut q);
    if entity.def().soft_delete {
        q.push(&format!(
            "UPDATE {} SET {} = 1 WHERE {}",
            entity.table(),
            SOFT_DELETE_COLUMN,
            condition
        ));
    } else {
        q.push(&format!("DELETE FROM {} WHERE {}", entity.table(), condition));
    }
    q
}

/// `id` / `label` pairs for dropdowns pointing at `entity`. The default `Id` display
/// column labels by key when the target declares no `Id` column.
pub fn foreign_key_options<'d>(entity: &ResolvedEntity, display_column: &str, dialect: &'d dyn SqlDialect) -> QueryBuf<'d> {
    let label_column = if display_column.eq_ignore_ascii_case("Id") && entity.column(display_column).is_none() {
        entity.key()
    } else {
        display_column
    };
    let key_type = entity.column(entity.key()).map_or("int", |c| c.type_.as_str());
    let mut q = QueryBuf::new(dialect);
    q.push(&format!(
        "SELECT {} AS id, {} AS label FROM {}",
        dialect.read_expr(&entity.qualified(entity.key()), key_type),
        dialect.read_expr(&entity.qualified(label_column), "text"),
        entity.table()
    ));
    if entity.def().soft_delete {
        q.push(&format!(" WHERE {}", soft_delete_guard(entity)));
    }
    q.order_by("label", "ASC");
    q
}

/// Single-value aggregate for a stat card. `None` for an unknown aggregate or sum/avg without a column.
pub fn stat_query<'d>(
    entity: &ResolvedEntity,
    stat: &DashboardStatDefinition,
    dialect: &'d dyn SqlDialect,
) -> Option<QueryBuf<'d>> {
    let column = stat.column.as_deref().filter(|c| !c.trim().is_empty());
    let select = match (Aggregate::parse(&stat.aggregate)?, column) {
        (Aggregate::Sum, Some(col)) => dialect.read_expr(&format!("COALESCE(SUM({}), 0)", col), "double"),
        (Aggregate::Avg, Some(col)) => dialect.read_expr(&format!("COALESCE(AVG({}), 0)", col), "double"),
        (Aggregate::Count, _) => "COUNT(*)".to_string(),
        _ => return None,
    };
    let mut q = QueryBuf::new(dialect);
    q.push(&format!("SELECT {} FROM {}", select, entity.table()));
    if let Some(filter) = stat.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        q.push(&format!(" WHERE {}", filter));
    }
    Some(q)
}

/// Grouped `label` / `value` rows for a chart. `label_entity` is the resolved label join target, if any.
pub fn chart_query<'d>(
    entity: &ResolvedEntity,
    chart: &DashboardChartDefinition,
    label_entity: Option<&ResolvedEntity>,
    dialect: &'d dyn SqlDialect,
) -> QueryBuf<'d> {
    let column = chart.value_column.as_deref().filter(|c| !c.trim().is_empty());
    let value_expr = match (Aggregate::parse(&chart.value_aggregate), column) {
        (Some(Aggregate::Sum), Some(col)) => dialect.read_expr(&format!("SUM({})", col), "double"),
        (Some(Aggregate::Avg), Some(col)) => dialect.read_expr(&format!("AVG({})", col), "double"),
        _ => "COUNT(*)".to_string(),
    };

    let mut q = QueryBuf::new(dialect);
    let join = label_entity.zip(chart.label_join_key.as_deref());
    let group_by = match join {
        Some((target, join_key)) => {
            let display = chart.label_join_display.as_deref().unwrap_or(target.key());
            q.push(&format!(
                "SELECT {} AS label, {} AS value FROM {} JOIN {} j ON {} = j.{}",
                dialect.read_expr(&format!("j.{}", display), "text"),
                value_expr,
                entity.table(),
                target.table(),
                entity.qualified(join_key),
                target.key()
            ));
            format!("j.{}", display)
        }
        None => {
            let group = chart.group_expression.as_deref().filter(|g| !g.trim().is_empty()).unwrap_or("1");
            q.push(&format!(
                "SELECT {} AS label, {} AS value FROM {}",
                dialect.read_expr(group, "text"),
                value_expr,
                entity.table()
            ));
            group.to_string()
        }
    };

    if let Some(filter) = chart.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        q.push(&format!(" WHERE {}", filter));
    }
    q.push(&format!(" GROUP BY {}", group_by));

    let order_col = match chart.order_by.as_deref() {
        Some(o) if o.eq_ignore_ascii_case("label") => "label",
        _ => "value",
    };
    let order_dir = match chart.order_dir.as_deref() {
        Some(d) if d.eq_ignore_ascii_case("asc") => "ASC",
        _ => "DESC",
    };
    q.order_by(order_col, order_dir);
    dialect.append_limit(&mut q, chart.limit.max(1));
    q
}
