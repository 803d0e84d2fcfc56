//! Auth status endpoint, reachable without credentials.

use axum::extract::{RawQuery, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;
use crate::middleware::auth::{bearer_token, is_authorized, query_token};

#[derive(Debug, Serialize)]
pub struct AuthStatusResponse {
    pub auth_enabled: bool,
    pub authenticated: bool,
}

/// GET /api/auth/status
pub async fn auth_status(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Json<AuthStatusResponse> {
    let auth = &ctx.config.auth;
    Json(AuthStatusResponse {
        auth_enabled: auth.enabled,
        authenticated: is_authorized(auth, bearer_token(&headers), query_token(query.as_deref())),
    })
}
