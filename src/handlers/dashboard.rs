use crate::extractors::Locale;
use crate::response::success_one;
use crate::service::dashboard::build_dashboard;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse};

/// GET /api/v1/dashboard
pub async fn dashboard(State(state): State<AppState>, locale: Locale) -> impl IntoResponse {
    let view = build_dashboard(&state.repo, &state.catalog, &state.dashboard, locale.as_str()).await;
    success_one(view)
}
