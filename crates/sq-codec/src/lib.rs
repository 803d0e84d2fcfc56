//! sq-codec: image and PDF conversion behind a common [`Codec`] trait.
//!
//! A codec is handed the full input buffer and a [`ProgressSender`], and
//! returns the encoded output. Codecs are synchronous and CPU-bound; callers
//! in async code run them on a blocking thread.

pub mod format;
pub mod pdf;
pub mod progress;
pub mod raster;

pub use format::{output_file_name, CompressionLevel, InputKind, OutputFormat};
pub use pdf::PdfCodec;
pub use progress::ProgressSender;
pub use raster::{ImageCodec, ImageOptions};

/// Output of a successful conversion.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub data: Vec<u8>,
    pub content_type: &'static str,
    /// File extension (without the dot) matching `content_type`.
    pub extension: &'static str,
}

/// A single format conversion.
///
/// Progress reports are on the codec's own 0-100 scale, non-decreasing, and
/// end with 100 on success.
pub trait Codec: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Convert `input`, reporting progress through `progress`.
    fn convert(&self, input: &[u8], progress: &ProgressSender) -> sq_core::Result<Encoded>;
}
