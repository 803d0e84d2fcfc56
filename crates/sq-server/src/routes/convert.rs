//! Conversion endpoints.
//!
//! Both endpoints take the source document as base64 (raw or as a `data:`
//! URL) inside a JSON body, run it through the orchestrator and answer with
//! the stored artifact's summary.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::{Extension, Json};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use sq_codec::{CompressionLevel, ImageCodec, ImageOptions, OutputFormat, PdfCodec};
use sq_core::{Error, Result};

use crate::context::AppContext;
use crate::conversion::ConversionResult;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;
use crate::router::json_body_limit;

#[derive(Debug, Deserialize)]
pub struct ConvertImageRequest {
    /// Base64 source image, optionally as a `data:` URL.
    pub data: String,
    /// Target format: `jpeg`, `png`, `webp` or `avif`.
    pub format: String,
    #[serde(default)]
    pub compression: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub max_dimension: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CompressPdfRequest {
    pub data: String,
    #[serde(default)]
    pub compression: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// POST /api/convert/image
pub async fn convert_image(
    State(ctx): State<AppContext>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ConvertImageRequest>, JsonRejection>,
) -> std::result::Result<Json<ConversionResult>, AppError> {
    let Json(req) = payload.map_err(|r| rid.error(rejection_error(r, &ctx, &headers)))?;
    run_image(&ctx, req).await.map(Json).map_err(|e| rid.error(e))
}

/// POST /api/convert/pdf
pub async fn compress_pdf(
    State(ctx): State<AppContext>,
    Extension(rid): Extension<RequestId>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CompressPdfRequest>, JsonRejection>,
) -> std::result::Result<Json<ConversionResult>, AppError> {
    let Json(req) = payload.map_err(|r| rid.error(rejection_error(r, &ctx, &headers)))?;
    run_pdf(&ctx, req).await.map(Json).map_err(|e| rid.error(e))
}

async fn run_image(ctx: &AppContext, req: ConvertImageRequest) -> Result<ConversionResult> {
    if req.format.trim().is_empty() {
        return Err(Error::Validation("format is required".into()));
    }
    let format =
        OutputFormat::parse(&req.format).ok_or_else(|| Error::unsupported("image", req.format.trim()))?;
    let level = CompressionLevel::parse(req.compression.as_deref().unwrap_or_default());
    let source = decode_payload(&req.data, ctx.max_upload_bytes())?;
    let options = ImageOptions::new(format, level).with_max_dimension(req.max_dimension);

    tracing::info!(
        format = %format,
        level = %level,
        bytes = source.len(),
        max_dimension = ?options.max_dimension,
        "Image conversion requested"
    );

    let name = display_name(req.file_name.as_deref(), "image");
    ctx.orchestrator
        .run(Arc::new(ImageCodec::new(options)), source, name)
        .await
}

async fn run_pdf(ctx: &AppContext, req: CompressPdfRequest) -> Result<ConversionResult> {
    let level = CompressionLevel::parse(req.compression.as_deref().unwrap_or_default());
    let source = decode_payload(&req.data, ctx.max_upload_bytes())?;

    tracing::info!(level = %level, bytes = source.len(), "PDF compression requested");

    let name = display_name(req.file_name.as_deref(), "document.pdf");
    ctx.orchestrator
        .run(Arc::new(PdfCodec::new(level)), source, name)
        .await
}

fn display_name<'a>(supplied: Option<&'a str>, fallback: &'a str) -> &'a str {
    supplied.map(str::trim).filter(|n| !n.is_empty()).unwrap_or(fallback)
}

/// Decode a base64 payload, accepting `data:<mime>;base64,` prefixes and
/// embedded whitespace. Payloads that decode to more than `limit` bytes are
/// rejected.
pub fn decode_payload(data: &str, limit: u64) -> Result<Vec<u8>> {
    let data = data.trim();
    let encoded = if data.starts_with("data:") {
        data.split_once(',')
            .map(|(_, body)| body)
            .ok_or_else(|| Error::Validation("malformed data URL".into()))?
    } else {
        data
    };

    let encoded: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if encoded.is_empty() {
        return Err(Error::Validation("data is required".into()));
    }

    // Each 4 base64 characters carry at most 3 bytes.
    let upper_bound = (encoded.len() as u64).div_ceil(4) * 3;
    if upper_bound.saturating_sub(2) > limit {
        return Err(Error::too_large(limit, upper_bound));
    }

    let bytes = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| Error::Validation(format!("data is not valid base64: {e}")))?;

    if bytes.len() as u64 > limit {
        return Err(Error::too_large(limit, bytes.len() as u64));
    }
    Ok(bytes)
}

fn rejection_error(rejection: JsonRejection, ctx: &AppContext, headers: &HeaderMap) -> Error {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let limit = json_body_limit(ctx.max_upload_bytes()) as u64;
        let actual = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(limit.saturating_add(1));
        return Error::too_large(limit, actual);
    }
    Error::Validation(rejection.body_text())
}
