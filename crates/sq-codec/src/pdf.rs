//! PDF re-compression built on `lopdf`.
//!
//! Nothing is rasterized: the document is parsed, optionally cleaned of
//! unreferenced objects and metadata, its streams are deflated, and it is
//! serialized again.

use lopdf::{Document, Object};
use sq_core::{Error, Result};

use crate::format::{CompressionLevel, InputKind};
use crate::progress::ProgressSender;
use crate::{Codec, Encoded};

pub const PDF_MIME: &str = "application/pdf";

/// Re-compresses PDF documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfCodec {
    level: CompressionLevel,
}

impl PdfCodec {
    pub fn new(level: CompressionLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> CompressionLevel {
        self.level
    }
}

impl Codec for PdfCodec {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn convert(&self, input: &[u8], progress: &ProgressSender) -> Result<Encoded> {
        match InputKind::sniff(input) {
            Some(InputKind::Pdf) => {}
            Some(other) => return Err(Error::unsupported(other.name(), "pdf")),
            None => return Err(Error::unsupported("unknown", "pdf")),
        }

        let mut doc = Document::load_mem(input).map_err(|e| Error::codec(self.name(), e))?;
        let pages = doc.get_pages().len();
        tracing::debug!(pages, objects = doc.objects.len(), "Parsed PDF");
        progress.send(20.0, &format!("Parsed {pages} page(s)"));

        if self.level != CompressionLevel::Low {
            let pruned = doc.prune_objects();
            let empty = doc.delete_zero_length_streams();
            tracing::debug!(pruned = pruned.len(), empty = empty.len(), "Pruned PDF objects");
        }
        if self.level == CompressionLevel::High {
            strip_metadata(&mut doc);
            doc.prune_objects();
            doc.renumber_objects();
        }
        progress.send(40.0, "Removed unused objects");

        doc.compress();
        progress.send(70.0, "Compressed streams");

        let mut data = Vec::with_capacity(input.len());
        doc.save_to(&mut data)
            .map_err(|e| Error::codec(self.name(), e))?;
        progress.send(100.0, "PDF compression complete");

        Ok(Encoded {
            data,
            content_type: PDF_MIME,
            extension: "pdf",
        })
    }
}

/// Drop the document information dictionary and XMP metadata stream.
fn strip_metadata(doc: &mut Document) {
    doc.trailer.remove(b"Info");

    let root = doc.trailer.get(b"Root").and_then(Object::as_reference);
    if let Ok(root) = root {
        if let Ok(catalog) = doc.get_object_mut(root).and_then(Object::as_dict_mut) {
            catalog.remove(b"Metadata");
        }
    }
}
