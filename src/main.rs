use crud_admin::{
    build_router, ensure_audit_table, load_catalog, load_dashboard, AppState, ConfigError, HookRegistry, Settings,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crud_admin=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    if !settings.provider.has_driver() {
        return Err(ConfigError::UnsupportedProvider(format!(
            "{:?} (SQL generation only; no bundled driver)",
            settings.provider
        ))
        .into());
    }
    let dialect = settings.provider.dialect();

    let catalog = load_catalog(&settings.config_dir)?;
    let dashboard = load_dashboard(&settings.config_dir, &catalog)?;

    sqlx::any::install_default_drivers();
    let pool = sqlx::any::AnyPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;
    ensure_audit_table(&pool, dialect.as_ref()).await?;

    let hooks = HookRegistry::with_samples();
    tracing::info!(
        dialect = dialect.name(),
        entities = catalog.len(),
        hooks = hooks.len(),
        "configuration loaded"
    );
    let state = AppState::new(pool, dialect, catalog, dashboard, hooks);

    let app = build_router(state, settings.max_body_bytes);
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
