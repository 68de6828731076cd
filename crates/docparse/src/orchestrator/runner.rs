use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::info_span;
use uuid::Uuid;

use crate::classifier::{self, FileType};
use crate::config::Config;
use crate::engine::OcrAdapter;
use crate::error::{DocparseError, OrchestratorError};
use crate::extractor::{PdfPage, PdfTextExtractor, SpreadsheetTableExtractor};
use crate::fields::{FieldTable, StructuredFieldExtractor};
use crate::storage::UploadStorage;
use crate::store::ocr_result_repo::NewOcrResult;
use crate::store::{
    metadata_repo, ocr_result_repo, parsed_file_repo, table_repo, Database, FileMetadataRow,
    FileStatus, ParsedFileRow,
};

use super::claims::ClaimMap;

/// Drives a file through `uploaded → processing → completed | failed`.
///
/// Shared across worker threads behind an `Arc`. The claim map guarantees
/// at most one run per file id; everything else here is immutable.
pub struct Orchestrator {
    db: Database,
    storage: UploadStorage,
    ocr: OcrAdapter,
    pdf: PdfTextExtractor,
    spreadsheet: SpreadsheetTableExtractor,
    fields: StructuredFieldExtractor,
    claims: ClaimMap,
}

/// Artifact stats accumulated during a run. Persisted into FileMetadata
/// at terminal state whether the run completed or failed. `artifacts`
/// counts the OcrResult and TableExtraction rows written so far.
#[derive(Default)]
struct RunStats {
    text: String,
    page_count: i64,
    artifacts: i64,
}

impl RunStats {
    fn push_text(&mut self, text: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(text);
    }
}

impl Orchestrator {
    /// Production constructor that builds all sub-components from config.
    pub fn from_config(config: &Config) -> Result<Self, DocparseError> {
        let db = Database::open(&config.database_path)?;
        let storage = UploadStorage::new(&config.storage_directory);
        let ocr = OcrAdapter::from_config(&config.ocr)?;
        let pdf = PdfTextExtractor::new(&config.pdf, config.ocr.dpi);

        let table = match &config.fields {
            Some(specs) => FieldTable::new(specs.clone()),
            None => FieldTable::payslip(),
        };
        let fields = StructuredFieldExtractor::new(&table)?;

        Ok(Self::new(db, storage, ocr, pdf, fields))
    }

    /// Constructor with injected sub-components, used by tests to swap in
    /// stub engines.
    pub fn new(
        db: Database,
        storage: UploadStorage,
        ocr: OcrAdapter,
        pdf: PdfTextExtractor,
        fields: StructuredFieldExtractor,
    ) -> Self {
        Self {
            db,
            storage,
            ocr,
            pdf,
            spreadsheet: SpreadsheetTableExtractor::new(),
            fields,
            claims: ClaimMap::new(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Computes the structured field view for a file on demand from its
    /// stored extracted text, using the currently configured field table.
    pub fn structured_view(&self, file_id: &str) -> Result<Option<Value>, DocparseError> {
        Ok(super::record::fetch_structured_view(
            &self.db,
            &self.fields,
            file_id,
        )?)
    }

    /// Accepts an upload: classifies the bytes, stores them, and creates
    /// the ParsedFile record in `uploaded` state. Unsupported content is
    /// rejected before anything is persisted.
    pub fn ingest(
        &self,
        original_name: &str,
        declared_mime: &str,
        content: &[u8],
    ) -> Result<ParsedFileRow, DocparseError> {
        let file_type = classifier::classify(content, original_name, declared_mime)
            .map_err(OrchestratorError::Classify)?;

        let id = Uuid::new_v4().to_string();
        let stored_path = self
            .storage
            .store(&id, content)
            .map_err(OrchestratorError::Storage)?;

        let now = Utc::now().to_rfc3339();
        let file = ParsedFileRow {
            id,
            original_name: original_name.to_string(),
            stored_path: stored_path.display().to_string(),
            file_type: file_type.as_str().to_string(),
            declared_mime: Some(declared_mime.to_string()),
            size_bytes: content.len() as i64,
            status: FileStatus::Uploaded.as_str().to_string(),
            error: None,
            created_at: now.clone(),
            updated_at: now,
        };
        parsed_file_repo::insert(&self.db, &file)?;

        log::info!(
            "Ingested '{}' as {} ({} bytes, id {})",
            file.original_name,
            file.file_type,
            file.size_bytes,
            file.id
        );

        Ok(file)
    }

    /// Processes an uploaded file to a terminal state. Returns the terminal
    /// status; a failed run is a normal outcome, not an `Err`. A concurrent
    /// call for the same id is a no-op: the loser observes the in-flight
    /// run instead of starting a duplicate one.
    pub fn process(&self, file_id: &str) -> Result<FileStatus, DocparseError> {
        let Some(_guard) = self.claims.try_claim(file_id) else {
            log::debug!("File {} already claimed, observing in-flight run", file_id);
            return Ok(FileStatus::Processing);
        };

        let file = self.load_file(file_id)?;
        if file.status != FileStatus::Uploaded.as_str() {
            return Err(OrchestratorError::InvalidState {
                id: file_id.to_string(),
                status: file.status,
            }
            .into());
        }

        self.run(file)
    }

    /// Re-runs a failed file. The only legal path out of `failed`; prior
    /// partial artifacts are cleared so the rerun never mixes attempts.
    pub fn retry(&self, file_id: &str) -> Result<FileStatus, DocparseError> {
        let Some(_guard) = self.claims.try_claim(file_id) else {
            log::debug!("File {} already claimed, observing in-flight run", file_id);
            return Ok(FileStatus::Processing);
        };

        let file = self.load_file(file_id)?;
        if file.status != FileStatus::Failed.as_str() {
            return Err(OrchestratorError::InvalidState {
                id: file_id.to_string(),
                status: file.status,
            }
            .into());
        }

        ocr_result_repo::delete_by_file(&self.db, file_id)?;
        table_repo::delete_by_file(&self.db, file_id)?;

        self.run(file)
    }

    /// Deletes a file record (children cascade) and its stored bytes.
    /// Returns whether a record existed.
    pub fn delete_file(&self, file_id: &str) -> Result<bool, DocparseError> {
        let existed = parsed_file_repo::delete(&self.db, file_id)?;
        self.storage
            .remove(file_id)
            .map_err(OrchestratorError::Storage)?;
        if existed {
            log::info!("Deleted file {}", file_id);
        }
        Ok(existed)
    }

    fn load_file(&self, file_id: &str) -> Result<ParsedFileRow, DocparseError> {
        parsed_file_repo::find_by_id(&self.db, file_id)?
            .ok_or_else(|| OrchestratorError::FileNotFound(file_id.to_string()).into())
    }

    fn run(&self, file: ParsedFileRow) -> Result<FileStatus, DocparseError> {
        let _span = info_span!("orchestrator.run",
            file_id = %file.id,
            file_type = %file.file_type,
        )
        .entered();

        let started = Instant::now();
        parsed_file_repo::update_status(
            &self.db,
            &file.id,
            FileStatus::Processing,
            None,
            &Utc::now().to_rfc3339(),
        )?;

        let mut stats = RunStats::default();
        let outcome = self.run_stages(&file, &mut stats).and_then(|()| {
            if stats.artifacts == 0 {
                Err(OrchestratorError::NoExtractableContent(file.id.clone()).into())
            } else {
                Ok(())
            }
        });

        // The owner may have deleted the file mid-run. Results for a
        // deleted file are discarded, never resurrected.
        if parsed_file_repo::find_by_id(&self.db, &file.id)?.is_none() {
            log::info!("File {} was deleted mid-run, discarding results", file.id);
            return Err(OrchestratorError::FileNotFound(file.id).into());
        }

        let now = Utc::now().to_rfc3339();
        metadata_repo::upsert(
            &self.db,
            &FileMetadataRow {
                file_id: file.id.clone(),
                char_count: stats.text.chars().count() as i64,
                word_count: stats.text.split_whitespace().count() as i64,
                page_count: stats.page_count,
                duration_ms: started.elapsed().as_millis() as i64,
                created_at: now.clone(),
            },
        )?;

        match outcome {
            Ok(()) => {
                parsed_file_repo::update_status(
                    &self.db,
                    &file.id,
                    FileStatus::Completed,
                    None,
                    &now,
                )?;
                log::info!(
                    "Completed {} in {} ms ({} pages)",
                    file.id,
                    started.elapsed().as_millis(),
                    stats.page_count
                );
                Ok(FileStatus::Completed)
            }
            Err(e) => {
                let message = e.to_string();
                parsed_file_repo::update_status(
                    &self.db,
                    &file.id,
                    FileStatus::Failed,
                    Some(&message),
                    &now,
                )?;
                log::error!("Processing {} failed: {}", file.id, message);
                Ok(FileStatus::Failed)
            }
        }
    }

    fn run_stages(&self, file: &ParsedFileRow, stats: &mut RunStats) -> Result<(), DocparseError> {
        let content = self
            .storage
            .read(&file.id)
            .map_err(OrchestratorError::Storage)?;

        let file_type = FileType::from_str(&file.file_type).ok_or_else(|| {
            OrchestratorError::InvalidState {
                id: file.id.clone(),
                status: format!("unknown file type '{}'", file.file_type),
            }
        })?;

        match file_type {
            FileType::Image => self.stage_image(file, &content, stats)?,
            FileType::Pdf => self.stage_pdf(file, &content, stats)?,
            FileType::Excel => self.stage_excel(file, &content, stats)?,
        }
        Ok(())
    }

    fn stage_image(
        &self,
        file: &ParsedFileRow,
        content: &[u8],
        stats: &mut RunStats,
    ) -> Result<(), DocparseError> {
        let _span = info_span!("stage.image").entered();

        let recognition = self.ocr.recognize(content, None)?;
        stats.page_count = 1;
        stats.push_text(&recognition.text);

        ocr_result_repo::insert(
            &self.db,
            &file.id,
            &NewOcrResult {
                page_index: 0,
                engine_used: recognition.engine.as_str().to_string(),
                confidence: recognition.confidence.map(f64::from),
                extracted_text: recognition.text,
            },
            &Utc::now().to_rfc3339(),
        )?;
        stats.artifacts += 1;
        Ok(())
    }

    fn stage_pdf(&self, file: &ParsedFileRow, content: &[u8], stats: &mut RunStats) -> Result<(), DocparseError> {
        let _span = info_span!("stage.pdf").entered();

        let extraction = self.pdf.extract(content)?;
        stats.page_count = extraction.pages.len() as i64;

        // Pages persist one by one so a mid-run failure keeps what finished.
        for page in extraction.pages {
            let result = match page {
                PdfPage::Native { index, text } => NewOcrResult {
                    page_index: index,
                    engine_used: "pdf-native".to_string(),
                    confidence: None,
                    extracted_text: text,
                },
                PdfPage::Scanned { index, image_png } => {
                    let recognition = self.ocr.recognize(&image_png, Some(index))?;
                    NewOcrResult {
                        page_index: index,
                        engine_used: recognition.engine.as_str().to_string(),
                        confidence: recognition.confidence.map(f64::from),
                        extracted_text: recognition.text,
                    }
                }
            };

            stats.push_text(&result.extracted_text);
            ocr_result_repo::insert(&self.db, &file.id, &result, &Utc::now().to_rfc3339())?;
            stats.artifacts += 1;
        }
        Ok(())
    }

    fn stage_excel(
        &self,
        file: &ParsedFileRow,
        content: &[u8],
        stats: &mut RunStats,
    ) -> Result<(), DocparseError> {
        let _span = info_span!("stage.excel").entered();

        let sheets = self.spreadsheet.extract(content)?;
        stats.page_count = sheets.len() as i64;

        for sheet in &sheets {
            for row in std::iter::once(&sheet.header).chain(sheet.rows.iter()) {
                stats.push_text(&row.join(" "));
            }
            table_repo::insert(&self.db, &file.id, sheet, &Utc::now().to_rfc3339())?;
            stats.artifacts += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineKind, OcrEngine, Recognition};
    use crate::error::EngineError;
    use crate::orchestrator::record;
    use tempfile::TempDir;

    struct FixedEngine {
        text: &'static str,
    }

    impl OcrEngine for FixedEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::LocalTesseract
        }

        fn recognize(
            &self,
            _image: &[u8],
            _page_hint: Option<u32>,
        ) -> Result<Recognition, EngineError> {
            Ok(Recognition {
                text: self.text.to_string(),
                confidence: None,
                engine: EngineKind::LocalTesseract,
            })
        }
    }

    struct FailingEngine;

    impl OcrEngine for FailingEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::CloudVision
        }

        fn recognize(
            &self,
            _image: &[u8],
            _page_hint: Option<u32>,
        ) -> Result<Recognition, EngineError> {
            Err(EngineError::Recognition {
                engine: "cloud-vision".to_string(),
                reason: "unreadable".to_string(),
            })
        }
    }

    fn orchestrator_with_engine(dir: &TempDir, engine: Box<dyn OcrEngine>) -> Orchestrator {
        let db = Database::open_in_memory().unwrap();
        let storage = UploadStorage::new(dir.path());
        let ocr = OcrAdapter::new(engine, None);
        let pdf = PdfTextExtractor::new(&crate::config::PdfConfig::default(), 300);
        let fields = StructuredFieldExtractor::new(&FieldTable::payslip()).unwrap();
        Orchestrator::new(db, storage, ocr, pdf, fields)
    }

    // Smallest valid PNG: 1x1 transparent pixel.
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
        0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
        0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78,
        0x9C, 0x62, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00,
        0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn test_ingest_rejects_unsupported_before_persisting() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator_with_engine(&dir, Box::new(FixedEngine { text: "x" }));

        let result = orchestrator.ingest("notes.txt", "text/plain", b"plain text");
        assert!(result.is_err());
        assert!(
            parsed_file_repo::list(orchestrator.database(), None)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_image_processing_completes() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator_with_engine(
            &dir,
            Box::new(FixedEngine {
                text: "Employee Name Ada Lovelace",
            }),
        );

        let file = orchestrator.ingest("scan.png", "image/png", TINY_PNG).unwrap();
        let status = orchestrator.process(&file.id).unwrap();
        assert_eq!(status, FileStatus::Completed);

        let record = record::fetch_record(orchestrator.database(), &file.id)
            .unwrap()
            .unwrap();
        assert_eq!(record.file.status, "completed");
        assert_eq!(record.ocr_results.len(), 1);
        assert_eq!(record.ocr_results[0].engine_used, "local-tesseract");
        assert!(record.combined_text().contains("Ada Lovelace"));

        let metadata = record.metadata.unwrap();
        assert_eq!(metadata.page_count, 1);
        assert!(metadata.char_count > 0);

        let view = orchestrator.structured_view(&file.id).unwrap().unwrap();
        assert_eq!(view["employee"]["employee_name"], "Ada Lovelace");
    }

    #[test]
    fn test_engine_failure_marks_failed_with_error() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator_with_engine(&dir, Box::new(FailingEngine));

        let file = orchestrator.ingest("scan.png", "image/png", TINY_PNG).unwrap();
        let status = orchestrator.process(&file.id).unwrap();
        assert_eq!(status, FileStatus::Failed);

        let record = record::fetch_record(orchestrator.database(), &file.id)
            .unwrap()
            .unwrap();
        assert_eq!(record.file.status, "failed");
        assert!(record.error_summary().unwrap().contains("unreadable"));
        // Metadata is still written at the terminal state.
        assert!(record.metadata.is_some());
    }

    #[test]
    fn test_process_rejects_completed_file() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator_with_engine(&dir, Box::new(FixedEngine { text: "x" }));

        let file = orchestrator.ingest("scan.png", "image/png", TINY_PNG).unwrap();
        orchestrator.process(&file.id).unwrap();

        let result = orchestrator.process(&file.id);
        assert!(matches!(
            result,
            Err(DocparseError::Orchestrator(
                OrchestratorError::InvalidState { .. }
            ))
        ));
    }

    #[test]
    fn test_retry_only_from_failed() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator_with_engine(&dir, Box::new(FixedEngine { text: "x" }));

        let file = orchestrator.ingest("scan.png", "image/png", TINY_PNG).unwrap();
        let result = orchestrator.retry(&file.id);
        assert!(matches!(
            result,
            Err(DocparseError::Orchestrator(
                OrchestratorError::InvalidState { .. }
            ))
        ));
    }

    #[test]
    fn test_process_unknown_id() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator_with_engine(&dir, Box::new(FixedEngine { text: "x" }));

        assert!(matches!(
            orchestrator.process("no-such-id"),
            Err(DocparseError::Orchestrator(
                OrchestratorError::FileNotFound(_)
            ))
        ));
    }

    #[test]
    fn test_delete_file_removes_record_and_bytes() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator_with_engine(&dir, Box::new(FixedEngine { text: "x" }));

        let file = orchestrator.ingest("scan.png", "image/png", TINY_PNG).unwrap();
        assert!(orchestrator.delete_file(&file.id).unwrap());
        assert!(!orchestrator.delete_file(&file.id).unwrap());
        assert!(record::fetch_record(orchestrator.database(), &file.id)
            .unwrap()
            .is_none());
    }
}
