use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::properties::StoreError;
use crate::storage::StorageError;
use crate::visualization::ResolveError;

/// Errors a route handler can end with.
#[derive(Debug, Error)]
pub enum WebError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    /// Not logged in; carries the full login URL including `next`.
    #[error("login required")]
    Unauthenticated { location: String },
    #[error("{0}")]
    Internal(String),
}

impl WebError {
    pub fn not_found(message: &str) -> Self {
        Self::NotFound(message.to_string())
    }

    pub fn login(login_url: &str, next: &str) -> Self {
        let separator = if login_url.contains('?') { '&' } else { '?' };
        Self::Unauthenticated {
            location: format!("{login_url}{separator}next={}", urlencoding::encode(next)),
        }
    }
}

impl From<ResolveError> for WebError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotFound(message) => Self::not_found(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for WebError {
    fn from(e: StoreError) -> Self {
        Self::Internal(format!("property store: {e}"))
    }
}

impl From<StorageError> for WebError {
    fn from(e: StorageError) -> Self {
        Self::Internal(format!("storage: {e}"))
    }
}

impl From<anyhow::Error> for WebError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(format!("database: {e}"))
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message).into_response(),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Unauthenticated { location } => {
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
            }
            Self::Internal(message) => {
                error!("Request failed: {message}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_redirect_location() {
        let response = WebError::login("/accounts/login/", "/documents/a b.txt").into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/accounts/login/?next=%2Fdocuments%2Fa%20b.txt"
        );

        let response = WebError::login("https://sso.example/login?app=pln", "/").into_response();
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://sso.example/login?app=pln&next=%2F"
        );
    }

    #[test]
    fn test_resolve_errors_map_to_status() {
        let not_found: WebError = ResolveError::NotFound("Visualization not found").into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let store: WebError =
            ResolveError::Store(StoreError::MissingKey("id:1:freqdist".to_string())).into();
        assert_eq!(
            store.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
