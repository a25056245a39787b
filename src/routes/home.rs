use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

use crate::app::AppState;
use crate::models::api::HealthResponse;
use crate::templates::pages::IndexTemplate;
use crate::templates::render;

/// Public routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
}

/// GET /
async fn index() -> Response {
    render(IndexTemplate)
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        environment: state.settings.environment.clone(),
        version: state.settings.version.clone(),
    })
}
