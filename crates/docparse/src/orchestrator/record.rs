//! Layered read view over a parsed file and its child artifacts.

use serde_json::Value;

use crate::classifier::FileType;
use crate::fields::StructuredFieldExtractor;
use crate::store::{
    metadata_repo, ocr_result_repo, parsed_file_repo, table_repo, Database, FileMetadataRow,
    OcrResultRow, ParsedFileRow, StoreError, TableExtractionRow,
};

/// Everything known about one file: the root row plus whatever child
/// artifacts exist. Failed files surface their partial artifacts and the
/// recorded error; callers never have to join tables themselves.
#[derive(Debug)]
pub struct FileRecord {
    pub file: ParsedFileRow,
    pub ocr_results: Vec<OcrResultRow>,
    pub metadata: Option<FileMetadataRow>,
    pub tables: Vec<TableExtractionRow>,
}

impl FileRecord {
    /// Full extracted text in page order.
    pub fn combined_text(&self) -> String {
        self.ocr_results
            .iter()
            .map(|r| r.extracted_text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The recorded error for failed files.
    pub fn error_summary(&self) -> Option<&str> {
        self.file.error.as_deref()
    }
}

/// Reads the full layered record for a file id.
pub fn fetch_record(db: &Database, file_id: &str) -> Result<Option<FileRecord>, StoreError> {
    let Some(file) = parsed_file_repo::find_by_id(db, file_id)? else {
        return Ok(None);
    };

    Ok(Some(FileRecord {
        ocr_results: ocr_result_repo::find_by_file(db, file_id)?,
        metadata: metadata_repo::find_by_file(db, file_id)?,
        tables: table_repo::find_by_file(db, file_id)?,
        file,
    }))
}

/// Computes the structured field view for a file from its stored extracted
/// text. Nothing is persisted: reconfiguring the field table changes the
/// view served for every existing file on the next read. Spreadsheets and
/// files without extracted text have no view.
pub fn fetch_structured_view(
    db: &Database,
    fields: &StructuredFieldExtractor,
    file_id: &str,
) -> Result<Option<Value>, StoreError> {
    let Some(record) = fetch_record(db, file_id)? else {
        return Ok(None);
    };
    if record.file.file_type == FileType::Excel.as_str() {
        return Ok(None);
    }

    let text = record.combined_text();
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(fields.extract(&text).record))
}
