//! Multipart upload endpoint.
//!
//! Accepts a single `file` field and hands it back base64-encoded so a
//! browser client can feed it to the conversion endpoints.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::{Extension, Json};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use sq_codec::InputKind;
use sq_core::{Error, Result};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
    /// File content, base64-encoded.
    pub data: String,
}

/// POST /api/upload
pub async fn upload(
    State(ctx): State<AppContext>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<UploadResponse>, AppError> {
    let multipart = multipart.map_err(|r| rid.error(Error::Validation(r.body_text())))?;
    receive(&ctx, multipart, &headers)
        .await
        .map(Json)
        .map_err(|e| rid.error(e))
}

async fn receive(ctx: &AppContext, mut multipart: Multipart, headers: &HeaderMap) -> Result<UploadResponse> {
    let limit = ctx.max_upload_bytes();
    let read_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Error::too_large(limit, content_length(headers).unwrap_or(limit.saturating_add(1)))
        } else {
            Error::Validation(e.body_text())
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(read_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("upload")
            .to_string();
        let declared = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(read_error)?;

        if data.is_empty() {
            return Err(Error::Validation("uploaded file is empty".into()));
        }
        if data.len() as u64 > limit {
            return Err(Error::too_large(limit, data.len() as u64));
        }

        let kind = resolve_kind(declared.as_deref(), &data).ok_or_else(|| {
            Error::unsupported(declared.as_deref().unwrap_or("unknown"), "image or pdf")
        })?;

        tracing::info!(
            file_name = %file_name,
            content_type = kind.mime_type(),
            bytes = data.len(),
            "Upload received"
        );

        return Ok(UploadResponse {
            file_name,
            content_type: kind.mime_type().to_string(),
            size: data.len(),
            data: STANDARD.encode(&data),
        });
    }

    Err(Error::Validation(format!("multipart field '{FILE_FIELD}' is required")))
}

/// Decide what an upload is. Sniffed bytes take precedence, but a specific
/// declared type that is not accepted is rejected outright.
fn resolve_kind(declared: Option<&str>, data: &[u8]) -> Option<InputKind> {
    let sniffed = InputKind::sniff(data);
    match declared.map(str::trim).filter(|m| !m.is_empty() && !is_generic(m)) {
        None => sniffed,
        Some(mime) => InputKind::from_mime(mime).map(|declared| sniffed.unwrap_or(declared)),
    }
}

fn is_generic(mime: &str) -> bool {
    ["application/octet-stream", "binary/octet-stream", "application/unknown"]
        .iter()
        .any(|g| mime.eq_ignore_ascii_case(g))
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
