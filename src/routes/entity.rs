//! Entity routes. The entity name is a path segment resolved case-insensitively by the handlers.

use crate::handlers::dashboard::dashboard;
use crate::handlers::entity::{create, create_form, delete as delete_handler, edit_form, index, list, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/entities", get(index))
        .route("/entities/:entity", get(list).post(create))
        .route("/entities/:entity/form", get(create_form))
        .route(
            "/entities/:entity/:id",
            get(read).put(update).delete(delete_handler),
        )
        .route("/entities/:entity/:id/form", get(edit_form))
        .route("/dashboard", get(dashboard))
        .with_state(state)
}
