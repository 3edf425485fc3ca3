//! Router assembly.

mod common;
mod entity;

pub use common::common_routes;
pub use entity::entity_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

pub const API_PREFIX: &str = "/api/v1";

/// Full application router: health endpoints at the root, entity and dashboard API under `/api/v1`.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .nest(API_PREFIX, entity_routes(state))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
}
