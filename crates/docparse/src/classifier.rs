//! File type classification from content signatures and declared names.
//!
//! Signature bytes always win over the declared mime type; the filename
//! extension is only consulted when the signature is inconclusive.

use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Pdf,
    Excel,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Pdf => "pdf",
            FileType::Excel => "excel",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "image" => Some(FileType::Image),
            "pdf" => Some(FileType::Pdf),
            "excel" => Some(FileType::Excel),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies uploaded bytes into a supported file family.
///
/// Deterministic and total: identical input always yields the same result,
/// and every input either classifies or returns `UnsupportedFileType`.
pub fn classify(
    content: &[u8],
    original_name: &str,
    declared_mime: &str,
) -> Result<FileType, ClassifyError> {
    if let Some(file_type) = classify_by_signature(content, original_name) {
        return Ok(file_type);
    }

    if let Some(file_type) = classify_by_extension(original_name) {
        return Ok(file_type);
    }

    Err(ClassifyError::UnsupportedFileType {
        name: original_name.to_string(),
        declared_mime: declared_mime.to_string(),
    })
}

/// Content-signature dispatch. Returns `None` when no known magic matches.
fn classify_by_signature(content: &[u8], original_name: &str) -> Option<FileType> {
    if content.starts_with(b"%PDF-") {
        return Some(FileType::Pdf);
    }

    if is_image_signature(content) {
        return Some(FileType::Image);
    }

    // Legacy .xls: OLE2 / Compound File Binary header.
    if content.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
        return Some(FileType::Excel);
    }

    // ZIP container: xlsx when the extension agrees; otherwise inconclusive,
    // since docx, jars and plain archives share the same magic.
    if content.starts_with(b"PK\x03\x04") {
        let ext = extension_of(original_name);
        if matches!(ext.as_str(), "xlsx" | "xlsm") {
            return Some(FileType::Excel);
        }
        // Scan the archive head for an "xl/" entry name, so spreadsheets
        // renamed to .zip still classify.
        if find_subslice(&content[..content.len().min(4096)], b"xl/").is_some() {
            return Some(FileType::Excel);
        }
    }

    None
}

fn is_image_signature(content: &[u8]) -> bool {
    const SIGNATURES: &[&[u8]] = &[
        &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], // PNG
        &[0xFF, 0xD8, 0xFF],                                // JPEG
        b"GIF87a",
        b"GIF89a",
        b"BM",                       // BMP
        &[0x49, 0x49, 0x2A, 0x00],   // TIFF little-endian
        &[0x4D, 0x4D, 0x00, 0x2A],   // TIFF big-endian
    ];

    if SIGNATURES.iter().any(|sig| content.starts_with(sig)) {
        return true;
    }

    // WebP: RIFF....WEBP
    content.len() >= 12 && &content[0..4] == b"RIFF" && &content[8..12] == b"WEBP"
}

/// Extension fallback through mime_guess, used when the signature is
/// inconclusive (e.g. truncated uploads or bare ZIP containers).
fn classify_by_extension(original_name: &str) -> Option<FileType> {
    let ext = extension_of(original_name);
    match ext.as_str() {
        "xls" | "xlsx" | "xlsm" => return Some(FileType::Excel),
        "pdf" => return Some(FileType::Pdf),
        _ => {}
    }

    let guessed = mime_guess::from_path(original_name).first()?;
    match guessed.type_().as_str() {
        "image" => Some(FileType::Image),
        _ if guessed.essence_str() == "application/pdf" => Some(FileType::Pdf),
        _ => None,
    }
}

fn extension_of(name: &str) -> String {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_pdf_by_signature() {
        let result = classify(b"%PDF-1.5\n...", "upload.bin", "application/octet-stream");
        assert_eq!(result.unwrap(), FileType::Pdf);
    }

    #[test]
    fn test_classify_png_by_signature() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
        let result = classify(&png, "scan", "application/octet-stream");
        assert_eq!(result.unwrap(), FileType::Image);
    }

    #[test]
    fn test_classify_jpeg_by_signature() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(classify(&jpeg, "photo.jpg", "image/jpeg").unwrap(), FileType::Image);
    }

    #[test]
    fn test_classify_webp_by_signature() {
        let mut webp = Vec::from(*b"RIFF");
        webp.extend_from_slice(&[0x24, 0x00, 0x00, 0x00]);
        webp.extend_from_slice(b"WEBP");
        assert_eq!(classify(&webp, "pic", "").unwrap(), FileType::Image);
    }

    #[test]
    fn test_signature_beats_declared_mime() {
        // Declared as an image but the bytes say PDF.
        let result = classify(b"%PDF-1.4", "misnamed.png", "image/png");
        assert_eq!(result.unwrap(), FileType::Pdf);
    }

    #[test]
    fn test_classify_xlsx_zip_with_extension() {
        let result = classify(b"PK\x03\x04rest-of-archive", "payroll.xlsx", "");
        assert_eq!(result.unwrap(), FileType::Excel);
    }

    #[test]
    fn test_classify_xlsx_zip_by_inner_marker() {
        let mut bytes = Vec::from(*b"PK\x03\x04");
        bytes.extend_from_slice(b"......xl/workbook.xml......");
        let result = classify(&bytes, "export.zip", "application/zip");
        assert_eq!(result.unwrap(), FileType::Excel);
    }

    #[test]
    fn test_classify_legacy_xls() {
        let cfb = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0x00];
        assert_eq!(classify(&cfb, "old.xls", "").unwrap(), FileType::Excel);
    }

    #[test]
    fn test_extension_fallback_when_signature_inconclusive() {
        let result = classify(b"no known magic here", "report.pdf", "");
        assert_eq!(result.unwrap(), FileType::Pdf);

        let result = classify(b"no known magic here", "scan.tiff", "");
        assert_eq!(result.unwrap(), FileType::Image);
    }

    #[test]
    fn test_unsupported_type() {
        let result = classify(b"hello world", "notes.txt", "text/plain");
        match result {
            Err(ClassifyError::UnsupportedFileType { name, .. }) => {
                assert_eq!(name, "notes.txt");
            }
            other => panic!("Expected UnsupportedFileType, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_is_deterministic() {
        let bytes = b"PK\x03\x04payload";
        let a = classify(bytes, "book.xlsx", "application/zip").unwrap();
        let b = classify(bytes, "book.xlsx", "application/zip").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_input_is_total() {
        assert!(classify(&[], "", "").is_err());
    }

    #[test]
    fn test_file_type_round_trip() {
        for ft in [FileType::Image, FileType::Pdf, FileType::Excel] {
            assert_eq!(FileType::from_str(ft.as_str()), Some(ft));
        }
        assert_eq!(FileType::from_str("docx"), None);
    }
}
