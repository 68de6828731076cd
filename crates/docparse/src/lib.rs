pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod fields;
pub mod orchestrator;
pub mod storage;
pub mod store;
pub mod telemetry;
pub mod worker;

pub use classifier::{classify, FileType};
pub use config::{load_config, Config};
pub use engine::{OcrAdapter, OcrEngine, Recognition};
pub use error::{
    ClassifyError, ConfigError, DocparseError, EngineError, ExtractError, OrchestratorError,
    Result, StorageError, WorkerError,
};
pub use extractor::{PdfTextExtractor, SheetTable, SpreadsheetTableExtractor};
pub use fields::{FieldTable, StructuredFieldExtractor};
pub use orchestrator::{fetch_record, fetch_structured_view, FileRecord, Orchestrator};
pub use storage::UploadStorage;
pub use store::{Database, FileStatus, StoreError};
pub use telemetry::init_tracing;
pub use worker::{Job, JobResult, WorkerPool};
