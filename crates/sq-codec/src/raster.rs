//! Raster image codec built on the `image` crate.

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{self, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use sq_core::{Error, Result};

use crate::format::{CompressionLevel, InputKind, OutputFormat};
use crate::progress::ProgressSender;
use crate::{Codec, Encoded};

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 8;

/// Options for a raster conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    pub format: OutputFormat,
    pub level: CompressionLevel,
    /// Longest edge allowed in the output; larger images are downscaled.
    pub max_dimension: Option<u32>,
}

impl ImageOptions {
    pub fn new(format: OutputFormat, level: CompressionLevel) -> Self {
        Self {
            format,
            level,
            max_dimension: None,
        }
    }

    pub fn with_max_dimension(mut self, max: Option<u32>) -> Self {
        self.max_dimension = max.filter(|m| *m > 0);
        self
    }
}

/// Decodes any supported raster format and re-encodes it.
#[derive(Debug, Clone)]
pub struct ImageCodec {
    options: ImageOptions,
}

impl ImageCodec {
    pub fn new(options: ImageOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ImageOptions {
        &self.options
    }
}

impl Codec for ImageCodec {
    fn name(&self) -> &'static str {
        "image"
    }

    fn convert(&self, input: &[u8], progress: &ProgressSender) -> Result<Encoded> {
        let target = self.options.format;

        let source = match InputKind::sniff(input) {
            Some(InputKind::Image(format)) => format,
            Some(other) => return Err(Error::unsupported(other.name(), target.to_string())),
            None => return Err(Error::unsupported("unknown", target.to_string())),
        };

        let img = image::load_from_memory_with_format(input, source)
            .map_err(|e| Error::codec(self.name(), e))?;
        tracing::debug!(
            width = img.width(),
            height = img.height(),
            source = ?source,
            "Decoded image"
        );
        progress.send(25.0, &format!("Decoded {}x{} image", img.width(), img.height()));

        let img = match self.options.max_dimension {
            Some(max) if img.width() > max || img.height() > max => {
                let resized = img.resize(max, max, FilterType::Lanczos3);
                tracing::debug!(
                    width = resized.width(),
                    height = resized.height(),
                    "Downscaled image"
                );
                resized
            }
            _ => img,
        };
        progress.send(50.0, "Prepared pixels");

        let data = encode(&img, target, self.options.level).map_err(|e| Error::codec(self.name(), e))?;
        progress.send(90.0, &format!("Encoded {target}"));

        progress.send(100.0, "Image conversion complete");
        Ok(Encoded {
            data,
            content_type: target.mime_type(),
            extension: target.extension(),
        })
    }
}

/// Encode `img` as `format`. Pixels are normalized to 8-bit RGB(A) first since
/// none of the target encoders accept every source layout.
fn encode(
    img: &DynamicImage,
    format: OutputFormat,
    level: CompressionLevel,
) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();

    match format {
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, level.quality()))?;
        }
        OutputFormat::Png => {
            let compression = match level {
                CompressionLevel::Low => png::CompressionType::Fast,
                CompressionLevel::Medium => png::CompressionType::Default,
                CompressionLevel::High => png::CompressionType::Best,
            };
            let encoder =
                PngEncoder::new_with_quality(&mut buf, compression, png::FilterType::Adaptive);
            normalized(img).write_with_encoder(encoder)?;
        }
        OutputFormat::Webp => {
            normalized(img).write_with_encoder(WebPEncoder::new_lossless(&mut buf))?;
        }
        OutputFormat::Avif => {
            let encoder = AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, level.quality());
            normalized(img).write_with_encoder(encoder)?;
        }
    }

    Ok(buf)
}

fn normalized(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}
