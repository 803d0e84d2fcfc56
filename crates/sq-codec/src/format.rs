//! Output formats, compression levels and input sniffing.

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// Image formats the raster codec can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::Webp,
        OutputFormat::Avif,
    ];

    /// Parse a user-supplied format name (case-insensitive, `jpg` accepted).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::Webp),
            "avif" => Some(OutputFormat::Avif),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
            OutputFormat::Avif => "image/avif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// CompressionLevel
// ---------------------------------------------------------------------------

/// How aggressively to trade fidelity for size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl CompressionLevel {
    /// Parse a level name. Unknown or empty values fall back to `Medium`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => CompressionLevel::Low,
            "high" => CompressionLevel::High,
            _ => CompressionLevel::Medium,
        }
    }

    /// Lossy encoder quality (1-100) for this level.
    pub fn quality(self) -> u8 {
        match self {
            CompressionLevel::Low => 85,
            CompressionLevel::Medium => 70,
            CompressionLevel::High => 50,
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionLevel::Low => "low",
            CompressionLevel::Medium => "medium",
            CompressionLevel::High => "high",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Input sniffing
// ---------------------------------------------------------------------------

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Raster formats accepted as conversion input.
const DECODABLE: [ImageFormat; 6] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

/// What a byte buffer turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Image(ImageFormat),
    Pdf,
}

impl InputKind {
    /// Identify a buffer by its leading magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(PDF_MAGIC) {
            return Some(InputKind::Pdf);
        }
        image::guess_format(data)
            .ok()
            .filter(|f| DECODABLE.contains(f))
            .map(InputKind::Image)
    }

    /// Map a declared MIME type to an accepted input kind.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.split(';').next().unwrap_or_default().trim();
        if mime.eq_ignore_ascii_case("application/pdf") {
            return Some(InputKind::Pdf);
        }
        ImageFormat::from_mime_type(mime.to_ascii_lowercase())
            .filter(|f| DECODABLE.contains(f))
            .map(InputKind::Image)
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            InputKind::Image(format) => format.to_mime_type(),
            InputKind::Pdf => "application/pdf",
        }
    }

    /// Short lowercase name used in log lines and error messages.
    pub fn name(self) -> String {
        match self {
            InputKind::Image(format) => format
                .extensions_str()
                .first()
                .copied()
                .unwrap_or("image")
                .to_string(),
            InputKind::Pdf => "pdf".to_string(),
        }
    }
}

/// Replace the extension of `original` with `extension`.
///
/// `photo.png` + `jpg` gives `photo.jpg`; names without a stem fall back to
/// `converted`.
pub fn output_file_name(original: &str, extension: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let stem = match base.rfind('.') {
        Some(0) | None => base,
        Some(idx) => &base[..idx],
    };
    let stem = if stem.is_empty() { "converted" } else { stem };
    format!("{stem}.{extension}")
}
