use axum::http::{HeaderMap, Uri, header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Settings;
use crate::error::WebError;
use crate::models::api::AuthContext;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub user_id: Option<String>,
    /// Backward-compat: entity_id.
    pub entity_id: Option<String>,
    /// Expiration time (Unix timestamp).
    pub exp: Option<u64>,
}

/// Verify a JWT token and extract auth context.
pub fn verify_token(token: &str, secret: &str, algorithm: &str) -> Result<AuthContext, String> {
    let algo = match algorithm {
        "HS256" => jsonwebtoken::Algorithm::HS256,
        "HS384" => jsonwebtoken::Algorithm::HS384,
        "HS512" => jsonwebtoken::Algorithm::HS512,
        _ => return Err(format!("Unsupported algorithm: {algorithm}")),
    };

    let mut validation = Validation::new(algo);
    // Allow some clock drift.
    validation.leeway = 60;
    // Don't require specific claims.
    validation.required_spec_claims = std::collections::HashSet::new();

    let key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &key, &validation)
        .map_err(|e| format!("Token validation failed: {e}"))?;

    let claims = token_data.claims;
    let user_id = claims
        .user_id
        .or(claims.entity_id)
        .ok_or_else(|| "Token carries no user id".to_string())?;

    Ok(AuthContext { user_id })
}

/// Session token from `Authorization: Bearer` or, failing that, the session cookie.
fn session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Extract auth context from request headers.
pub fn extract_auth(headers: &HeaderMap, settings: &Settings) -> Result<AuthContext, String> {
    if settings.bypass_auth_mode {
        return Ok(AuthContext {
            user_id: settings.dev_user_id.clone(),
        });
    }

    let token = session_token(headers, &settings.session_cookie)
        .ok_or_else(|| "Missing session token".to_string())?;

    verify_token(token, &settings.jwt_secret_key, &settings.jwt_algorithm)
}

/// Auth context for a login-protected page, or a redirect to the login URL
/// that returns to `uri` afterwards.
pub fn require_login(
    headers: &HeaderMap,
    uri: &Uri,
    settings: &Settings,
) -> Result<AuthContext, WebError> {
    extract_auth(headers, settings).map_err(|reason| {
        debug!(path = uri.path(), "redirecting to login: {reason}");
        let next = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        WebError::login(&settings.login_url, next)
    })
}
