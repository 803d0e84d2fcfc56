//! Authentication middleware.
//!
//! When auth is enabled every protected route requires the configured API
//! key, either as `Authorization: Bearer <key>` or, for WebSocket clients
//! that cannot set headers, as a `?token=<key>` query parameter.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use sq_core::config::AuthConfig;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Check the supplied credentials against the auth config.
///
/// Always succeeds when auth is disabled. Fails when auth is enabled but no
/// API key is configured.
pub fn is_authorized(auth: &AuthConfig, bearer: Option<&str>, query_token: Option<&str>) -> bool {
    if !auth.enabled {
        return true;
    }
    let Some(api_key) = auth.api_key.as_deref().filter(|k| !k.is_empty()) else {
        return false;
    };
    bearer.or(query_token).is_some_and(|token| token == api_key)
}

/// Extract the token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Extract the `token` parameter from a raw query string.
pub fn query_token(query: Option<&str>) -> Option<&str> {
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|t| !t.is_empty())
}

/// Authentication middleware. Applied to protected routes only.
pub async fn auth_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = is_authorized(
        &ctx.config.auth,
        bearer_token(request.headers()),
        query_token(request.uri().query()),
    );

    if authorized {
        return Ok(next.run(request).await);
    }

    tracing::debug!(path = %request.uri().path(), "Rejected unauthenticated request");
    let mut err = AppError::new(sq_core::Error::Unauthorized("a valid API key is required".into()));
    if let Some(RequestId(id)) = request.extensions().get::<RequestId>() {
        err = err.with_request_id(id.clone());
    }
    Err(err)
}
