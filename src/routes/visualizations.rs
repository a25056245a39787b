use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tracing::debug;

use crate::app::AppState;
use crate::auth::require_login;
use crate::error::WebError;
use crate::visualization::resolve::parse_visualization_file;
use crate::visualization::{Rendered, VisualizationRequest, resolve};

/// Per-document visualization route.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/documents/{document_slug}/visualizations/{file}",
        get(visualization),
    )
}

/// GET /documents/{document_slug}/visualizations/{visualization_key}.{format}
async fn visualization(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Path((document_slug, file)): Path<(String, String)>,
) -> Result<Response, WebError> {
    let auth = require_login(&headers, &uri, &state.settings)?;
    let (key, format) = parse_visualization_file(&file)
        .ok_or_else(|| WebError::not_found("Visualization not found"))?;

    let rendered = resolve(
        state.database.as_ref(),
        state.property_store.as_ref(),
        &VisualizationRequest {
            owner: &auth.user_id,
            document_slug: &document_slug,
            key,
            format,
        },
    )
    .await?;
    debug!(
        document_id = rendered.document.id,
        visualization = rendered.visualization,
        template = rendered.template,
        "rendered visualization"
    );

    into_response(rendered)
}

fn into_response(rendered: Rendered) -> Result<Response, WebError> {
    let content_type = HeaderValue::from_str(&rendered.content_type())
        .map_err(|e| WebError::Internal(format!("content type: {e}")))?;
    let disposition = rendered
        .content_disposition()
        .map(|d| HeaderValue::from_str(&d))
        .transpose()
        .map_err(|e| WebError::Internal(format!("content disposition: {e}")))?;

    let mut response = (StatusCode::OK, rendered.body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(disposition) = disposition {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok(response)
}
