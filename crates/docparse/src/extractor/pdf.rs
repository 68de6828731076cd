//! PDF text extraction with scanned-page detection.
//!
//! Embedded text is pulled per page with lopdf. Pages whose text is empty,
//! below the minimal-character threshold, or dominated by font-encoding
//! noise are classified as image pages; their rendered bitmaps are handed
//! to the OCR adapter by the orchestrator, which reassembles the document
//! text in original page order.

use std::process::Command;

use crate::config::PdfConfig;
use crate::error::ExtractError;

/// One page of a PDF, in original order.
#[derive(Debug)]
pub enum PdfPage {
    /// The page carried a usable embedded text layer.
    Native { index: u32, text: String },
    /// The page is image-only; `image_png` is the rendered bitmap.
    Scanned { index: u32, image_png: Vec<u8> },
}

impl PdfPage {
    pub fn index(&self) -> u32 {
        match self {
            PdfPage::Native { index, .. } | PdfPage::Scanned { index, .. } => *index,
        }
    }
}

#[derive(Debug)]
pub struct PdfExtraction {
    pub pages: Vec<PdfPage>,
}

impl PdfExtraction {
    pub fn has_scanned_pages(&self) -> bool {
        self.pages
            .iter()
            .any(|p| matches!(p, PdfPage::Scanned { .. }))
    }
}

pub struct PdfTextExtractor {
    min_native_chars: usize,
    dpi: u32,
}

impl PdfTextExtractor {
    pub fn new(config: &PdfConfig, dpi: u32) -> Self {
        Self {
            min_native_chars: config.min_native_chars,
            dpi,
        }
    }

    /// Extracts all pages. Fails with `CorruptDocument` only when the
    /// container itself cannot be parsed; per-page problems are logged and
    /// the page is dropped rather than failing the document.
    pub fn extract(&self, pdf_bytes: &[u8]) -> Result<PdfExtraction, ExtractError> {
        let _span = tracing::info_span!("extractor.pdf").entered();

        let doc = lopdf::Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractError::CorruptDocument(format!("Failed to load PDF: {}", e)))?;

        let mut pages = Vec::new();

        for (index, (page_num, _)) in doc.get_pages().iter().enumerate() {
            let index = index as u32;
            let text = doc.extract_text(&[*page_num]).unwrap_or_default();

            if is_native_text(&text, self.min_native_chars) {
                pages.push(PdfPage::Native { index, text });
                continue;
            }

            // pdftoppm numbers pages from 1 in document order.
            match render_page_to_png(pdf_bytes, index + 1, self.dpi) {
                Ok(image_png) => pages.push(PdfPage::Scanned { index, image_png }),
                Err(e) => {
                    log::warn!("Dropping unrenderable PDF page {}: {}", index, e);
                }
            }
        }

        Ok(PdfExtraction { pages })
    }
}

/// Marker lopdf emits for CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Minimum share of alphanumeric characters for text to count as a real
/// text layer rather than garbled font output.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// Whether a page's embedded text is usable as-is. Anything else routes
/// the page to OCR.
fn is_native_text(text: &str, min_chars: usize) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");
    if cleaned.is_empty() {
        return false;
    }

    let total_chars = trimmed.chars().count();
    if total_chars < min_chars {
        return false;
    }

    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();
    alphanumeric_chars * 100 >= total_chars * MIN_ALPHANUMERIC_PERCENT
}

/// Renders one page through pdftoppm (poppler-utils) via temp files.
fn render_page_to_png(pdf_bytes: &[u8], page_num: u32, dpi: u32) -> Result<Vec<u8>, ExtractError> {
    let temp_dir = std::env::temp_dir();
    let pdf_path = temp_dir.join(format!("docparse_render_{}.pdf", uuid::Uuid::new_v4()));
    let output_prefix = temp_dir.join(format!("docparse_page_{}", uuid::Uuid::new_v4()));

    std::fs::write(&pdf_path, pdf_bytes).map_err(|e| ExtractError::PageRender {
        page: page_num,
        reason: format!("Failed to write temp PDF: {}", e),
    })?;

    let output = Command::new("pdftoppm")
        .args([
            "-png",
            "-r",
            &dpi.to_string(),
            "-f",
            &page_num.to_string(),
            "-l",
            &page_num.to_string(),
            &pdf_path.to_string_lossy(),
            &output_prefix.to_string_lossy(),
        ])
        .output();

    let _ = std::fs::remove_file(&pdf_path);

    let output = output.map_err(|e| ExtractError::PageRender {
        page: page_num,
        reason: format!(
            "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
            e
        ),
    })?;

    if !output.status.success() {
        return Err(ExtractError::PageRender {
            page: page_num,
            reason: format!("pdftoppm failed: {}", String::from_utf8_lossy(&output.stderr)),
        });
    }

    // pdftoppm pads the page-number suffix depending on page count.
    let candidates = [
        format!("{}-{}.png", output_prefix.display(), page_num),
        format!("{}-{:02}.png", output_prefix.display(), page_num),
        format!("{}-{:03}.png", output_prefix.display(), page_num),
    ];

    let image_path = candidates
        .iter()
        .find(|p| std::path::Path::new(p).exists())
        .ok_or_else(|| ExtractError::PageRender {
            page: page_num,
            reason: "Rendered page image not found".to_string(),
        })?;

    let image_data = std::fs::read(image_path).map_err(|e| ExtractError::PageRender {
        page: page_num,
        reason: format!("Failed to read rendered image: {}", e),
    })?;

    let _ = std::fs::remove_file(image_path);

    Ok(image_data)
}
