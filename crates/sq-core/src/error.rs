//! Unified error type for squash.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].

use std::fmt;

/// Unified error type covering all failure modes in squash.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request data was missing or failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The codec cannot handle the requested input/output combination.
    #[error("Unsupported format: cannot convert {input} to {output}")]
    UnsupportedFormat {
        /// Detected or declared input format.
        input: String,
        /// Requested output format.
        output: String,
    },

    /// The underlying conversion library failed.
    #[error("{codec} conversion failed: {message}")]
    Codec {
        /// Codec that raised the error ("image", "pdf").
        codec: String,
        /// Human-readable error description.
        message: String,
    },

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "artifact").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A payload exceeded the configured size ceiling.
    #[error("Payload too large: {actual} bytes exceeds the {limit} byte limit")]
    SizeLimitExceeded {
        /// Maximum accepted size in bytes.
        limit: u64,
        /// Observed size in bytes.
        actual: u64,
    },

    /// The caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A conversion did not finish within the configured timeout.
    #[error("Conversion timed out after {secs}s")]
    Timeout {
        /// Configured timeout in seconds.
        secs: u64,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::UnsupportedFormat { .. } => 415,
            Error::Codec { .. } => 500,
            Error::NotFound { .. } => 404,
            Error::SizeLimitExceeded { .. } => 413,
            Error::Unauthorized(_) => 401,
            Error::Timeout { .. } => 504,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::UnsupportedFormat { .. } => "unsupported_format",
            Error::Codec { .. } => "codec_failure",
            Error::NotFound { .. } => "not_found",
            Error::SizeLimitExceeded { .. } => "size_limit_exceeded",
            Error::Unauthorized(_) => "unauthorized",
            Error::Timeout { .. } => "timeout",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Codec`].
    pub fn codec(codec: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Codec {
            codec: codec.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::UnsupportedFormat`].
    pub fn unsupported(input: impl Into<String>, output: impl Into<String>) -> Self {
        Error::UnsupportedFormat {
            input: input.into(),
            output: output.into(),
        }
    }

    /// Convenience constructor for [`Error::SizeLimitExceeded`].
    pub fn too_large(limit: u64, actual: u64) -> Self {
        Error::SizeLimitExceeded { limit, actual }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
