//! Artifact download endpoint.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use sq_core::{ArtifactId, Error};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// GET /api/download/{id}
///
/// Serves the stored bytes and starts the artifact's removal grace period.
/// Unknown, expired and malformed ids are all 404.
pub async fn download(
    State(ctx): State<AppContext>,
    Extension(rid): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let record = id
        .parse::<ArtifactId>()
        .map_err(|_| Error::not_found("artifact", &id))
        .and_then(|id| ctx.store.get(&id))
        .map_err(|e| rid.error(e))?;

    tracing::info!(
        artifact_id = %record.id,
        bytes = record.size(),
        file_name = %record.display_name,
        "Serving artifact"
    );

    let headers = [
        (header::CONTENT_TYPE, record.content_type.clone()),
        (header::CONTENT_DISPOSITION, content_disposition(&record.display_name)),
        (header::CACHE_CONTROL, "no-store".to_string()),
    ];
    Ok((headers, Body::from(record.content)).into_response())
}

/// `attachment` disposition with a header-safe ASCII file name.
fn content_disposition(name: &str) -> String {
    let safe: String = name
        .chars()
        .filter(|c| (c.is_ascii_graphic() || *c == ' ') && *c != '"' && *c != '\\')
        .collect();
    let safe = safe.trim();
    let safe = if safe.is_empty() { "download" } else { safe };
    format!("attachment; filename=\"{safe}\"")
}
