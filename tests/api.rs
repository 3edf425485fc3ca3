//! End-to-end HTTP tests against the bundled config and an in-memory SQLite database.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use crud_admin::{
    build_router, ensure_audit_table, load_catalog, load_dashboard, AppState, ConfigError, DatabaseProvider,
    HookRegistry,
};
use serde_json::{json, Value};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use sqlx::Row;
use std::path::{Path, PathBuf};
use tower::ServiceExt;

const SCHEMA: &[&str] = &[
    "CREATE TABLE Customer (
        CustomerId INTEGER PRIMARY KEY AUTOINCREMENT,
        FirstName TEXT NOT NULL,
        LastName TEXT NOT NULL,
        Email TEXT,
        Country TEXT,
        IsDeleted INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE Invoice (
        InvoiceId INTEGER PRIMARY KEY AUTOINCREMENT,
        CustomerId INTEGER NOT NULL,
        InvoiceDate TEXT NOT NULL,
        BillingCountry TEXT,
        Total REAL NOT NULL
    )",
    "INSERT INTO Customer (FirstName, LastName, Email, Country) VALUES
        ('Luís', 'Gonçalves', 'luisg@embraer.com.br', 'Brazil'),
        ('Leonie', 'Köhler', 'leonekohler@surfeu.de', 'Germany'),
        ('François', 'Tremblay', 'ftremblay@gmail.com', 'Canada'),
        ('Frank', 'Harris', 'fharris@google.com', 'USA'),
        ('Jack', 'Smith', 'jacksmith@microsoft.com', 'USA')",
    "INSERT INTO Invoice (CustomerId, InvoiceDate, BillingCountry, Total) VALUES
        (2, '2021-01-01', 'Germany', 1.98),
        (4, '2021-01-02', 'USA', 3.96),
        (4, '2021-01-03', 'USA', 5.94),
        (1, '2021-02-01', 'Brazil', 8.91),
        (3, '2021-03-11', 'Canada', 13.86),
        (5, '2021-03-19', 'USA', 0.99)",
];

fn config_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config")
}

async fn setup_in(dir: &Path, max_body_bytes: usize) -> (Router, AnyPool) {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    for ddl in SCHEMA {
        sqlx::query(ddl).execute(&pool).await.unwrap();
    }
    let dialect = DatabaseProvider::Sqlite.dialect();
    ensure_audit_table(&pool, dialect.as_ref()).await.unwrap();

    let catalog = load_catalog(dir).unwrap();
    let dashboard = load_dashboard(dir, &catalog).unwrap();
    let state = AppState::new(pool.clone(), dialect, catalog, dashboard, HookRegistry::with_samples());
    (build_router(state, max_body_bytes), pool)
}

async fn setup_with_limit(max_body_bytes: usize) -> (Router, AnyPool) {
    setup_in(&config_dir(), max_body_bytes).await
}

async fn setup() -> (Router, AnyPool) {
    setup_with_limit(1024 * 1024).await
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>, headers: &[(&str, &str)]) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None, &[]).await
}

async fn audit_rows(pool: &AnyPool) -> Vec<(String, String, String, String)> {
    sqlx::query("SELECT COALESCE(UserName, ''), Action, Entity, Detail FROM AuditLog ORDER BY Id")
        .fetch_all(pool)
        .await
        .unwrap()
        .iter()
        .map(|r| (r.get(0), r.get(1), r.get(2), r.get(3)))
        .collect()
}

async fn scalar(pool: &AnyPool, sql: &str) -> i64 {
    sqlx::query(sql).fetch_one(pool).await.unwrap().get(0)
}

#[tokio::test]
async fn health_and_readiness() {
    let (app, _pool) = setup().await;
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = get(&app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");
    assert_eq!(body["dialect"], "sqlite");
    assert_eq!(body["entities"], 2);
}

#[tokio::test]
async fn entity_index_is_localized() {
    let (app, _pool) = setup().await;
    let (status, body) = send(&app, Method::GET, "/api/v1/entities", None, &[("accept-language", "de-DE,de;q=0.9")]).await;
    assert_eq!(status, StatusCode::OK);
    let customer = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["name"] == "customer")
        .unwrap();
    assert_eq!(customer["displayName"], "Kunden");
    assert_eq!(body["meta"]["dialect"], "sqlite");
    assert_eq!(body["meta"]["concatOperator"], "||");
}

#[tokio::test]
async fn numbered_list_sorts_and_pages() {
    let (app, _pool) = setup().await;
    let (status, body) = get(&app, "/api/v1/entities/customer?pageSize=2&page=2&sort=LastName&dir=asc").await;
    assert_eq!(status, StatusCode::OK);
    let view = &body["data"];
    let items = view["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["values"]["LastName"], "Köhler");
    assert_eq!(items[0]["values"]["FullName"], "Leonie Köhler");
    assert_eq!(items[1]["values"]["LastName"], "Smith");
    assert_eq!(view["paging"]["total"], 5);
    assert_eq!(view["paging"]["mode"], "numbered");
    assert_eq!(view["paging"]["hasMore"], false);

    let link = &items[0]["links"][0];
    assert_eq!(link["entity"], "invoice");
    assert_eq!(link["query"]["CustomerId"], "2");
    assert_eq!(link["query"]["sort"], "InvoiceDate");
    assert_eq!(view["filters"][0]["key"], "Country");
}

#[tokio::test]
async fn list_filters_and_search() {
    let (app, _pool) = setup().await;
    let (_, body) = get(&app, "/api/v1/entities/customer?Country=USA&Country=Canada&Country=USA").await;
    assert_eq!(body["data"]["paging"]["total"], 3);
    assert_eq!(body["data"]["appliedFilters"]["Country"], "USA,Canada");

    let (_, body) = get(&app, "/api/v1/entities/customer?search=gmail").await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["values"]["LastName"], "Tremblay");

    let (_, body) = get(&app, "/api/v1/entities/invoice?Total_min=5&Total_max=10").await;
    let ids: Vec<i64> = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["values"]["InvoiceId"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 4]);

    let (_, body) = get(&app, "/api/v1/entities/invoice?InvoiceDate_from=2021-03-01").await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);

    let (_, body) = get(&app, "/api/v1/entities/invoice?CustomerId=4").await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn keyset_list_follows_cursor() {
    let (app, _pool) = setup().await;
    let (status, body) = get(&app, "/api/v1/entities/invoice?pageSize=4").await;
    assert_eq!(status, StatusCode::OK);
    let view = &body["data"];
    assert_eq!(view["items"].as_array().unwrap().len(), 4);
    assert_eq!(view["items"][0]["values"]["CustomerName"], "Leonie Köhler");
    assert_eq!(view["paging"]["mode"], "keyset");
    assert_eq!(view["paging"]["total"], -1);
    assert_eq!(view["paging"]["hasMore"], true);
    assert_eq!(view["paging"]["nextCursor"], "4");

    let fk = view["filters"][0]["foreignKeyOptions"].as_array().unwrap();
    assert_eq!(fk.len(), 5);
    assert_eq!(fk[0]["label"], "Gonçalves");

    let (_, body) = get(&app, "/api/v1/entities/invoice?pageSize=4&cursor=4").await;
    let view = &body["data"];
    assert_eq!(view["items"].as_array().unwrap().len(), 2);
    assert_eq!(view["items"][0]["values"]["InvoiceId"], 5);
    assert_eq!(view["paging"]["hasMore"], false);
    assert!(view["paging"]["nextCursor"].is_null());

    let (_, body) = get(&app, "/api/v1/entities/invoice?pageSize=4&count=true").await;
    assert_eq!(body["data"]["paging"]["total"], 6);
}

#[tokio::test]
async fn read_and_not_found() {
    let (app, _pool) = setup().await;
    let (status, body) = get(&app, "/api/v1/entities/CUSTOMER/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["FirstName"], "François");

    let (status, body) = get(&app, "/api/v1/entities/customer/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, _) = get(&app, "/api/v1/entities/track").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn form_views() {
    let (app, _pool) = setup().await;
    let (_, body) = get(&app, "/api/v1/entities/customer/form").await;
    let keys: Vec<&str> = body["data"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["FirstName", "LastName", "Email", "Country"]);
    assert!(body["data"]["confirmation"].is_null());
    assert!(body["data"]["item"].is_null());
    assert_eq!(body["data"]["columns"], 2);

    let (_, body) = get(&app, "/api/v1/entities/customer/2/form").await;
    assert_eq!(body["data"]["confirmation"], "Save changes to this customer?");
    assert_eq!(body["data"]["item"]["CustomerId"], 2);

    let (_, body) = get(&app, "/api/v1/entities/invoice/form").await;
    let field = &body["data"]["fields"][0];
    assert_eq!(field["key"], "CustomerId");
    assert_eq!(field["foreignKey"]["picker"], true);
    assert_eq!(field["foreignKeyOptions"].as_array().unwrap().len(), 5);

    let (status, _) = get(&app, "/api/v1/entities/customer/42/form").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_writes_row_and_audit() {
    let (app, pool) = setup().await;
    let body = json!({"FirstName": "Ada", "LastName": "Lovelace", "Email": "ada@example.com", "Country": "UK"});
    let (status, resp) = send(&app, Method::POST, "/api/v1/entities/customer", Some(body), &[("x-user", "alice")]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["data"]["id"], 6);
    assert_eq!(resp["data"]["item"]["LastName"], "Lovelace");

    let audit = audit_rows(&pool).await;
    assert_eq!(
        audit,
        vec![("alice".into(), "create".into(), "customer".into(), "Created customer".into())]
    );
}

#[tokio::test]
async fn conversion_errors_are_unprocessable() {
    let (app, pool) = setup().await;
    let (status, resp) = send(
        &app,
        Method::POST,
        "/api/v1/entities/customer",
        Some(json!({"FirstName": "  ", "Email": "x@example.com"})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp["error"]["code"], "validation_error");
    assert_eq!(resp["error"]["details"]["FirstName"], "Required");
    assert_eq!(resp["error"]["details"]["LastName"], "Required");

    let (status, resp) = send(
        &app,
        Method::POST,
        "/api/v1/entities/invoice",
        Some(json!({"CustomerId": "one", "InvoiceDate": "someday", "Total": "x"})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp["error"]["details"]["CustomerId"], "Invalid integer");
    assert_eq!(resp["error"]["details"]["InvoiceDate"], "Invalid date");
    assert_eq!(resp["error"]["details"]["Total"], "Invalid decimal");

    assert!(audit_rows(&pool).await.is_empty());
}

#[tokio::test]
async fn hook_abort_rolls_back() {
    let (app, pool) = setup().await;
    let body = json!({"FirstName": "Bob", "LastName": "Spammer", "Email": "bob@spam.test"});
    let (status, resp) = send(&app, Method::POST, "/api/v1/entities/customer", Some(body), &[]).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp["error"]["details"][""].as_str().unwrap().contains("spam.test"));
    assert_eq!(scalar(&pool, "SELECT COUNT(*) FROM Customer").await, 5);
    assert!(audit_rows(&pool).await.is_empty());

    let body = json!({"CustomerId": 1, "InvoiceDate": "2021-04-01", "Total": 0});
    let (status, _) = send(&app, Method::POST, "/api/v1/entities/invoice", Some(body), &[]).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let body = json!({"CustomerId": 1, "InvoiceDate": "2021-04-01", "BillingCountry": "Brazil", "Total": "1,234.50"});
    let (status, resp) = send(&app, Method::POST, "/api/v1/entities/invoice", Some(body), &[]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["data"]["item"]["Total"], 1234.5);
    assert_eq!(scalar(&pool, "SELECT COUNT(*) FROM Invoice").await, 7);
}

#[tokio::test]
async fn update_touches_submitted_fields_only() {
    let (app, pool) = setup().await;
    let (status, resp) = send(
        &app,
        Method::PUT,
        "/api/v1/entities/customer/2",
        Some(json!({"FirstName": "leonie"})),
        &[("x-user", "bob")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["data"]["item"]["FirstName"], "Leonie");
    assert_eq!(resp["data"]["item"]["LastName"], "Köhler");
    assert_eq!(resp["data"]["item"]["Email"], "leonekohler@surfeu.de");

    let audit = audit_rows(&pool).await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].1, "update");
    assert_eq!(audit[0].3, "Updated customer id=2");

    let (status, resp) = send(&app, Method::PUT, "/api/v1/entities/invoice/1", Some(json!({"Total": "abc"})), &[]).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp["error"]["details"]["Total"], "Invalid decimal");

    let (status, _) = send(&app, Method::PUT, "/api/v1/entities/invoice/99", Some(json!({"Total": 5})), &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::PUT, "/api/v1/entities/invoice/1", Some(json!(["Total"])), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_without_editable_fields_is_rejected() {
    let (app, pool) = setup().await;
    for body in [json!({}), json!({"CustomerId": 9, "Unknown": "x"})] {
        let (status, resp) = send(&app, Method::PUT, "/api/v1/entities/customer/2", Some(body), &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"]["code"], "bad_request");
    }
    assert!(audit_rows(&pool).await.is_empty());
    let (_, body) = get(&app, "/api/v1/entities/customer/2").await;
    assert_eq!(body["data"]["FirstName"], "Leonie");
}

#[tokio::test]
async fn foreign_key_without_display_column_labels_by_key() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("entities.yml"),
        r#"
entities:
  customer:
    table: Customer
    key: CustomerId
    softDelete: true
    columns:
      CustomerId: { type: int, identity: true }
      LastName: {}
  invoice:
    table: Invoice
    key: InvoiceId
    columns:
      InvoiceId: { type: int, identity: true }
      CustomerId: { type: int }
    filters:
      CustomerId:
        type: dropdown
        foreignKey: { entity: customer }
"#,
    )
    .unwrap();
    let (app, _pool) = setup_in(tmp.path(), 1024 * 1024).await;

    let (status, body) = get(&app, "/api/v1/entities/invoice").await;
    assert_eq!(status, StatusCode::OK);
    let fk = body["data"]["filters"][0]["foreignKeyOptions"].as_array().unwrap();
    assert_eq!(fk.len(), 5);
    assert_eq!(fk[0]["id"], 1);
    assert_eq!(fk[0]["label"], 1);
    assert_eq!(fk[4]["label"], 5);
}

#[tokio::test]
async fn soft_and_hard_delete() {
    let (app, pool) = setup().await;
    let (status, _) = send(&app, Method::DELETE, "/api/v1/entities/customer/5", None, &[("x-user", "carol")]).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = get(&app, "/api/v1/entities/customer/5").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(scalar(&pool, "SELECT IsDeleted FROM Customer WHERE CustomerId = 5").await, 1);

    let (_, body) = get(&app, "/api/v1/entities/customer").await;
    assert_eq!(body["data"]["paging"]["total"], 4);

    let (status, _) = send(&app, Method::DELETE, "/api/v1/entities/customer/5", None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, "/api/v1/entities/invoice/6", None, &[]).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(scalar(&pool, "SELECT COUNT(*) FROM Invoice").await, 5);

    let audit = audit_rows(&pool).await;
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[0], ("carol".into(), "delete".into(), "customer".into(), "Deleted customer id=5".into()));
}

#[tokio::test]
async fn dashboard_aggregates() {
    let (app, _pool) = setup().await;
    let (status, body) = get(&app, "/api/v1/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    let stats = body["data"]["stats"].as_array().unwrap();
    assert_eq!(stats.len(), 3);
    assert_eq!(stats[0]["value"], "5");
    assert_eq!(stats[1]["value"], "35.64");
    assert_eq!(stats[2]["value"], "5.94");

    let charts = body["data"]["charts"].as_array().unwrap();
    assert_eq!(charts[0]["labels"][0], "Canada");
    assert_eq!(charts[0]["labels"].as_array().unwrap().len(), 4);
    assert_eq!(charts[1]["labels"][0], "Harris");
    assert_eq!(charts[1]["values"][0], 2.0);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let (app, _pool) = setup_with_limit(64).await;
    let body = json!({"FirstName": "x".repeat(200), "LastName": "y", "Email": "z@example.com"});
    let (status, _) = send(&app, Method::POST, "/api/v1/entities/customer", Some(body), &[]).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[test]
fn unsafe_config_never_loads() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("entities.yml"),
        "entities:\n  customer:\n    table: \"Customer; DROP TABLE Customer\"\n    key: CustomerId\n",
    )
    .unwrap();
    let err = load_catalog(tmp.path()).unwrap_err();
    assert!(matches!(err, ConfigError::UnsafeIdentifier { .. }));
}
