use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::app::AppState;
use crate::auth::require_login;
use crate::error::WebError;
use crate::models::document::Document;
use crate::models::language::language_name;
use crate::properties::{PropertyGateway, StoreError};
use crate::storage::StorageError;
use crate::templates::pages::{DocumentTemplate, DocumentsTemplate, MetadataEntry, VisualizationLink};
use crate::templates::render;
use crate::templates::visualization::VisualizationTemplate;
use crate::visualization::available_for;

/// Document listing, detail and download routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/documents", get(list_documents))
        .route("/documents/{document_slug}", get(document_page))
        .route("/documents/{document_slug}/download", get(download_document))
}

async fn load_document(
    state: &AppState,
    owner: &str,
    slug: &str,
) -> Result<Document, WebError> {
    state
        .database
        .get_document(owner, slug)
        .await?
        .ok_or_else(|| WebError::not_found("Document not found"))
}

/// GET /documents
async fn list_documents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, WebError> {
    let auth = require_login(&headers, &uri, &state.settings)?;
    let documents = state.database.list_documents(&auth.user_id).await?;
    Ok(render(DocumentsTemplate { documents }))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Metadata rows from the pipeline's `file_metadata` and `language` properties.
async fn document_metadata(
    gateway: &mut PropertyGateway,
    document_id: i64,
) -> Result<Vec<MetadataEntry>, StoreError> {
    let mut metadata = Vec::new();
    if let Some(Value::Object(fields)) = gateway.get_optional(document_id, "file_metadata").await? {
        metadata.extend(fields.iter().map(|(name, value)| MetadataEntry {
            name: name.clone(),
            value: display_value(value),
        }));
    }
    if let Some(Value::String(code)) = gateway.get_optional(document_id, "language").await? {
        metadata.push(MetadataEntry {
            name: "Language".to_string(),
            value: language_name(&code).to_string(),
        });
    }
    Ok(metadata)
}

/// GET /documents/{document_slug}
async fn document_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Path(document_slug): Path<String>,
) -> Result<Response, WebError> {
    let auth = require_login(&headers, &uri, &state.settings)?;
    let document = load_document(&state, &auth.user_id, &document_slug).await?;
    let corpora = state.database.list_corpora(&auth.user_id).await?;

    let mut gateway = PropertyGateway::open(state.property_store.as_ref()).await?;
    let visualizations = match gateway.get_properties(document.id).await? {
        Some(properties) => {
            debug!(
                document_id = document.id,
                properties = properties.len(),
                "analysis finished"
            );
            available_for(&properties)
                .into_iter()
                .map(|v| VisualizationLink {
                    key: v.key,
                    label: v.label,
                    downloads: VisualizationTemplate::downloads_for(v.key),
                })
                .collect()
        }
        None => {
            debug!(document_id = document.id, "analysis not finished yet");
            Vec::new()
        }
    };
    let metadata = document_metadata(&mut gateway, document.id).await?;

    Ok(render(DocumentTemplate {
        document,
        corpora,
        metadata,
        visualizations,
    }))
}

/// GET /documents/{document_slug}/download
async fn download_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Path(document_slug): Path<String>,
) -> Result<Response, WebError> {
    let auth = require_login(&headers, &uri, &state.settings)?;
    let document = load_document(&state, &auth.user_id, &document_slug).await?;

    let data = match state.storage.download_file(&document.blob.key).await {
        Ok(data) => data,
        Err(StorageError::NotFound(_)) => return Err(WebError::not_found("File not found")),
        Err(e) => return Err(e.into()),
    };

    let content_type = mime_guess::from_path(&document.blob.filename)
        .first_or_octet_stream()
        .to_string();
    let disposition = format!(
        "attachment; filename=\"{}\"",
        document.blob.filename.replace(['"', '\\'], "_")
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}
