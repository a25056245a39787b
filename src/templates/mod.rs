//! Askama templates: full pages and per-(visualization, format) renderers.

pub mod pages;
pub mod visualization;

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("context does not match template: {0}")]
    Context(#[from] serde_json::Error),
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

/// Render a page template into an HTML response, 500 on failure.
pub fn render<T: Template>(tmpl: T) -> Response {
    render_with_status(StatusCode::OK, tmpl)
}

pub fn render_with_status<T: Template>(status: StatusCode, tmpl: T) -> Response {
    match tmpl.render() {
        Ok(body) => (status, Html(body)).into_response(),
        Err(e) => {
            error!("Template error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

/// Quote a CSV field when it contains a separator, quote or line break.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
