//! Axum router construction.
//!
//! Builds the application router with the API routes, middleware layers,
//! and optional static file serving for the browser UI.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::auth::auth_middleware;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Slack for multipart boundaries, headers and JSON framing.
const BODY_OVERHEAD: usize = 64 * 1024;

/// Request body ceiling for base64 JSON conversion requests.
pub fn json_body_limit(max_bytes: u64) -> usize {
    let encoded = max_bytes.div_ceil(3).saturating_mul(4);
    usize::try_from(encoded)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_OVERHEAD)
}

/// Request body ceiling for multipart uploads.
pub fn multipart_body_limit(max_bytes: u64) -> usize {
    usize::try_from(max_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_OVERHEAD)
}

/// Build the full application router.
pub fn build_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let max_bytes = ctx.max_upload_bytes();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Reachable without credentials.
    let auth_routes = Router::new().route("/auth/status", get(routes::auth::auth_status));

    let protected_routes = Router::new()
        .route(
            "/upload",
            post(routes::upload::upload)
                .layer(DefaultBodyLimit::max(multipart_body_limit(max_bytes))),
        )
        .route(
            "/convert/image",
            post(routes::convert::convert_image)
                .layer(DefaultBodyLimit::max(json_body_limit(max_bytes))),
        )
        .route(
            "/convert/pdf",
            post(routes::convert::compress_pdf)
                .layer(DefaultBodyLimit::max(json_body_limit(max_bytes))),
        )
        .route("/download/{id}", get(routes::download::download))
        .route("/ws", get(routes::progress::progress_socket))
        .layer(middleware::from_fn_with_state(ctx.clone(), auth_middleware));

    let api = auth_routes.merge(protected_routes);

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                tower_http::services::ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(tower_http::services::ServeFile::new(index_path)),
            );
        } else {
            tracing::warn!("Static directory {:?} does not exist; UI disabled", dir);
        }
    }

    app
}
