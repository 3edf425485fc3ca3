//! Entity handlers: index, list view, form views, read, create, update, delete.

use crate::config::{ForeignKeyDefinition, PagingMode, ResolvedEntity};
use crate::error::AppError;
use crate::extractors::{Actor, Locale};
use crate::hooks::{CrudOperation, HookContext, HookResult};
use crate::response::{success_created, success_one, success_with_meta};
use crate::service::audit::{self, AuditEntry};
use crate::service::convert::convert_form;
use crate::service::paging::{build_paged_items, collect_filters, resolve_count_enabled};
use crate::sql::{self, ListRequest, SqlValue, MAX_PAGE_SIZE};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use sqlx::AnyConnection;
use std::collections::HashMap;

fn lookup<'a>(state: &'a AppState, name: &str) -> Result<&'a ResolvedEntity, AppError> {
    state
        .catalog
        .get(name)
        .ok_or_else(|| AppError::NotFound(format!("entity '{}'", name)))
}

fn first<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.trim().is_empty())
}

/// Scalar JSON fields become form text; null is blank.
fn body_to_form(body: Value) -> Result<HashMap<String, String>, AppError> {
    let Value::Object(map) = body else {
        return Err(AppError::BadRequest("body must be a JSON object".into()));
    };
    let mut form = HashMap::with_capacity(map.len());
    for (k, v) in map {
        let text = match v {
            Value::Null => String::new(),
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(AppError::BadRequest(format!("field '{}' must be a scalar", k)));
            }
        };
        form.insert(k, text);
    }
    Ok(form)
}

fn text_of(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySummary {
    pub name: String,
    pub display_name: String,
    pub paging_mode: PagingMode,
}

/// GET /api/v1/entities
pub async fn index(State(state): State<AppState>, locale: Locale) -> impl IntoResponse {
    let data: Vec<EntitySummary> = state
        .catalog
        .iter()
        .filter(|e| e.def().is_public)
        .map(|e| EntitySummary {
            name: e.name().to_string(),
            display_name: e.def().display_name(e.name(), locale.as_str()),
            paging_mode: e.def().paging.mode,
        })
        .collect();
    success_with_meta(
        data,
        serde_json::json!({
            "dialect": state.dialect.name(),
            "concatOperator": state.dialect.concat_operator(),
        }),
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnView {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub sortable: bool,
    pub searchable: bool,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyDefinition>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterView {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key_options: Option<Vec<Value>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkView {
    pub key: String,
    pub label: String,
    pub entity: String,
    pub query: IndexMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub values: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagingView {
    pub mode: PagingMode,
    pub page: u32,
    pub page_size: u32,
    /// -1 when counting is disabled.
    pub total: i64,
    pub count_enabled: bool,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListView {
    pub entity: String,
    pub display_name: String,
    pub columns: Vec<ColumnView>,
    pub filters: Vec<FilterView>,
    pub filter_columns: u32,
    pub applied_filters: HashMap<String, String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub dir: Option<String>,
    pub items: Vec<ListItem>,
    pub paging: PagingView,
}

fn row_links(entity: &ResolvedEntity, row: &Value, locale: &str) -> Vec<LinkView> {
    entity
        .def()
        .links
        .iter()
        .map(|(key, link)| {
            let mut query = link.query.clone().unwrap_or_default();
            for (param, source) in link.filter.iter().flatten() {
                if let Some(v) = row.get(source).and_then(text_of) {
                    query.insert(param.clone(), v);
                }
            }
            LinkView {
                key: key.clone(),
                label: crate::config::resolve_label(link.label_i18n.as_ref(), &link.label, locale),
                entity: link.target_entity.clone(),
                query,
            }
        })
        .collect()
}

async fn fk_options(state: &AppState, fk: &ForeignKeyDefinition) -> Result<Vec<Value>, AppError> {
    let target = lookup(state, &fk.entity)?;
    state.repo.foreign_key_options(target, &fk.display_column).await
}

/// GET /api/v1/entities/:entity
pub async fn list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    locale: Locale,
) -> Result<impl IntoResponse, AppError> {
    let entity = lookup(&state, &name)?;
    let locale = locale.as_str();
    let mode = entity.def().paging.mode;

    let req = ListRequest {
        search: first(&pairs, "search").map(str::to_string),
        sort: first(&pairs, "sort").map(str::to_string),
        dir: first(&pairs, "dir").map(str::to_string),
        filters: collect_filters(entity, &pairs),
        page: first(&pairs, "page").and_then(|p| p.trim().parse::<u32>().ok()).unwrap_or(1).max(1),
        page_size: first(&pairs, "pageSize")
            .and_then(|p| p.trim().parse::<u32>().ok())
            .map(|n| n.min(MAX_PAGE_SIZE)),
        cursor: first(&pairs, "cursor").map(str::to_string),
        fetch_one_extra: false,
    };
    let count_enabled = resolve_count_enabled(entity, first(&pairs, "count"));
    let req = ListRequest {
        fetch_one_extra: mode == PagingMode::Keyset || !count_enabled,
        ..req
    };
    let page_size = req.effective_page_size(entity);

    let rows = state.repo.get_all(entity, &req).await?;
    let paged = build_paged_items(entity, rows, page_size, req.fetch_one_extra);
    let total = if count_enabled {
        state.repo.count(entity, req.search.as_deref(), &req.filters).await?
    } else {
        -1
    };

    let mut filters = Vec::new();
    for (key, filter) in entity.def().ordered_filters() {
        let foreign_key_options = match &filter.foreign_key {
            Some(fk) => Some(fk_options(&state, fk).await?),
            None => None,
        };
        filters.push(FilterView {
            key: key.to_string(),
            label: filter.label(key, locale),
            type_: filter.type_.clone(),
            options: filter.options.clone(),
            foreign_key_options,
        });
    }

    let columns = entity
        .def()
        .columns
        .iter()
        .map(|(key, c)| ColumnView {
            key: key.clone(),
            label: c.label(key, locale),
            type_: c.type_.clone(),
            sortable: c.sortable,
            searchable: c.searchable,
            hidden: c.hidden,
            foreign_key: c.foreign_key.clone(),
        })
        .collect();

    let items = paged
        .items
        .into_iter()
        .map(|row| ListItem {
            links: row_links(entity, &row, locale),
            values: row,
        })
        .collect();

    let view = ListView {
        entity: entity.name().to_string(),
        display_name: entity.def().display_name(entity.name(), locale),
        columns,
        filters,
        filter_columns: entity.def().layout.filters.columns,
        applied_filters: req.filters.clone(),
        search: req.search.clone(),
        sort: req.sort.clone(),
        dir: req.dir.clone(),
        items,
        paging: PagingView {
            mode,
            page: req.page,
            page_size,
            total,
            count_enabled,
            has_more: paged.has_more,
            next_cursor: paged.next_cursor,
            cursor: req.cursor.clone(),
        },
    };
    Ok(success_one(view))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub required: bool,
    pub editable: bool,
    pub identity: bool,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key_options: Option<Vec<Value>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormView {
    pub entity: String,
    pub display_name: String,
    pub columns: u32,
    pub fields: Vec<FieldView>,
    /// Prompt to show before saving, if configured.
    pub confirmation: Option<String>,
    pub item: Option<Value>,
}

async fn form_view(state: &AppState, entity: &ResolvedEntity, item: Option<Value>, locale: &str) -> Result<FormView, AppError> {
    let mut fields = Vec::new();
    for (key, form) in entity.def().ordered_forms() {
        let foreign_key_options = match &form.foreign_key {
            Some(fk) => Some(fk_options(state, fk).await?),
            None => None,
        };
        fields.push(FieldView {
            key: key.to_string(),
            label: form.label(key, locale),
            type_: form.type_.clone(),
            required: form.required,
            editable: form.editable,
            identity: form.identity,
            hidden: form.hidden,
            options: form.options.clone(),
            foreign_key: form.foreign_key.clone(),
            foreign_key_options,
        });
    }
    let confirmation = entity.def().confirmation.as_ref().and_then(|c| {
        if item.is_some() {
            c.update.clone()
        } else {
            c.create.clone()
        }
    });
    Ok(FormView {
        entity: entity.name().to_string(),
        display_name: entity.def().display_name(entity.name(), locale),
        columns: entity.def().layout.forms.columns,
        fields,
        confirmation: confirmation.filter(|c| !c.trim().is_empty()),
        item,
    })
}

/// GET /api/v1/entities/:entity/form
pub async fn create_form(
    State(state): State<AppState>,
    Path(name): Path<String>,
    locale: Locale,
) -> Result<impl IntoResponse, AppError> {
    let entity = lookup(&state, &name)?;
    Ok(success_one(form_view(&state, entity, None, locale.as_str()).await?))
}

/// GET /api/v1/entities/:entity/:id/form
pub async fn edit_form(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    locale: Locale,
) -> Result<impl IntoResponse, AppError> {
    let entity = lookup(&state, &name)?;
    let item = fetch_existing(&state, entity, &id).await?;
    Ok(success_one(form_view(&state, entity, Some(item), locale.as_str()).await?))
}

async fn fetch_existing(state: &AppState, entity: &ResolvedEntity, id: &str) -> Result<Value, AppError> {
    state
        .repo
        .get_by_id(entity, &SqlValue::from_id(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} id={}", entity.name(), id)))
}

/// GET /api/v1/entities/:entity/:id
pub async fn read(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = lookup(&state, &name)?;
    Ok(success_one(fetch_existing(&state, entity, &id).await?))
}

enum WriteOp {
    Create,
    Update(SqlValue),
    Delete(SqlValue),
}

/// Run one write, its hooks and its audit row in a transaction. Any error rolls everything back.
async fn execute_write(
    state: &AppState,
    entity: &ResolvedEntity,
    op: WriteOp,
    values: HashMap<String, SqlValue>,
    user: Option<String>,
) -> Result<Option<SqlValue>, AppError> {
    let mut tx = state.pool.begin().await?;
    match run_write(state, entity, op, values, user, &mut *tx).await {
        Ok(id) => {
            tx.commit().await?;
            Ok(id)
        }
        Err(e) => {
            tracing::warn!(entity = %entity.name(), error = %e, "write transaction rolled back");
            if let Err(rb) = tx.rollback().await {
                tracing::error!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}

async fn run_write(
    state: &AppState,
    entity: &ResolvedEntity,
    op: WriteOp,
    values: HashMap<String, SqlValue>,
    user: Option<String>,
    conn: &mut AnyConnection,
) -> Result<Option<SqlValue>, AppError> {
    let name = entity.name();
    let (operation, id) = match op {
        WriteOp::Delete(id) => {
            state.repo.delete(conn, entity, &id).await?;
            let entry = AuditEntry::new("delete", name, format!("Deleted {} id={}", name, id), user.as_deref());
            audit::write(conn, state.dialect.as_ref(), &entry).await?;
            return Ok(Some(id));
        }
        WriteOp::Create => (CrudOperation::Create, None),
        WriteOp::Update(id) => (CrudOperation::Update, Some(id)),
    };

    let configured = entity.def().hooks.clone().unwrap_or_default();
    let (before_name, after_name) = match operation {
        CrudOperation::Create => (configured.before_create, configured.after_create),
        CrudOperation::Update => (configured.before_update, configured.after_update),
    };
    let before = state.hooks.find_configured(before_name.as_deref());
    let after = state.hooks.find_configured(after_name.as_deref());

    let mut ctx = HookContext::new(name, operation, values);
    ctx.id = id;
    ctx.user = user;

    if let Some(hook) = &before {
        if let HookResult::Abort(message) = hook.before(&mut ctx, conn).await? {
            tracing::info!(entity = %name, hook = %hook.name(), message = %message, "write aborted by hook");
            return Err(AppError::rejected(message));
        }
    }

    let detail = match operation {
        CrudOperation::Create => {
            ctx.id = state.repo.insert(conn, entity, &ctx.values).await?.map(SqlValue::Int);
            format!("Created {}", name)
        }
        CrudOperation::Update => {
            let Some(id) = ctx.id.as_ref() else {
                return Err(AppError::BadRequest("update requires an id".into()));
            };
            state.repo.update(conn, entity, id, &ctx.values).await?;
            format!("Updated {} id={}", name, id)
        }
    };

    if let Some(hook) = &after {
        hook.after(&ctx, conn).await?;
    }

    let entry = AuditEntry::new(
        if operation == CrudOperation::Create { "create" } else { "update" },
        name,
        detail,
        ctx.user.as_deref(),
    );
    audit::write(conn, state.dialect.as_ref(), &entry).await?;
    Ok(ctx.id)
}

/// POST /api/v1/entities/:entity
pub async fn create(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Actor(user): Actor,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = lookup(&state, &name)?;
    let form = body_to_form(body)?;
    let converted = convert_form(entity, &form);
    if !converted.is_valid() {
        return Err(AppError::Validation(converted.errors));
    }
    let id = execute_write(&state, entity, WriteOp::Create, converted.values, user).await?;
    let row = match &id {
        Some(id) => state.repo.get_by_id(entity, id).await?,
        None => None,
    };
    Ok(success_created(serde_json::json!({ "id": id, "item": row })))
}

/// PUT /api/v1/entities/:entity/:id. Only submitted fields are converted and written.
pub async fn update(
    State(state): State<AppState>,
    Path((name, raw_id)): Path<(String, String)>,
    Actor(user): Actor,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = lookup(&state, &name)?;
    fetch_existing(&state, entity, &raw_id).await?;
    let form = body_to_form(body)?;
    let mut converted = convert_form(entity, &form);
    converted.values.retain(|k, _| form.contains_key(k));
    converted.errors.retain(|k, _| form.contains_key(k));
    if !converted.is_valid() {
        return Err(AppError::Validation(converted.errors));
    }
    if !converted.values.keys().any(|k| sql::is_updatable(entity, k)) {
        return Err(AppError::BadRequest("no editable fields submitted".into()));
    }
    let id = SqlValue::from_id(&raw_id);
    execute_write(&state, entity, WriteOp::Update(id.clone()), converted.values, user).await?;
    let row = state.repo.get_by_id(entity, &id).await?;
    Ok(success_one(serde_json::json!({ "id": id, "item": row })))
}

/// DELETE /api/v1/entities/:entity/:id
pub async fn delete(
    State(state): State<AppState>,
    Path((name, raw_id)): Path<(String, String)>,
    Actor(user): Actor,
) -> Result<impl IntoResponse, AppError> {
    let entity = lookup(&state, &name)?;
    fetch_existing(&state, entity, &raw_id).await?;
    execute_write(&state, entity, WriteOp::Delete(SqlValue::from_id(&raw_id)), HashMap::new(), user).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
