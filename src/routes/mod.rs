pub mod corpora;
pub mod documents;
pub mod home;
pub mod visualizations;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use std::sync::Arc;

use crate::app::AppState;

/// Build all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.settings.max_upload_bytes;
    Router::new()
        .merge(home::routes())
        .merge(corpora::routes())
        .merge(documents::routes())
        .merge(visualizations::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
