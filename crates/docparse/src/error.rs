use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocparseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid field spec '{name}': {reason}")]
    InvalidFieldSpec { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Unsupported file type for '{name}' (declared mime: {declared_mime})")]
    UnsupportedFileType { name: String, declared_mime: String },
}

/// Errors raised by OCR engines. Timeout, quota and unavailability are
/// recoverable: the adapter falls back to the secondary engine exactly once.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine '{engine}' timed out after {timeout_ms} ms")]
    Timeout { engine: String, timeout_ms: u64 },

    #[error("Engine '{engine}' quota exceeded")]
    QuotaExceeded { engine: String },

    #[error("Engine '{engine}' unavailable: {reason}")]
    Unavailable { engine: String, reason: String },

    #[error("Recognition failed in engine '{engine}': {reason}")]
    Recognition { engine: String, reason: String },

    #[error("All OCR engines failed (primary: {primary}; fallback: {fallback})")]
    Exhausted { primary: String, fallback: String },
}

impl EngineError {
    /// Whether the fallback policy may recover from this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::Timeout { .. }
                | EngineError::QuotaExceeded { .. }
                | EngineError::Unavailable { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Corrupt document: {0}")]
    CorruptDocument(String),

    #[error("Failed to render PDF page {page}: {reason}")]
    PageRender { page: u32, reason: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("No parsed file with id '{0}'")]
    FileNotFound(String),

    #[error("File '{id}' cannot move from status '{status}' to processing")]
    InvalidState { id: String, status: String },

    #[error("No extractable content in file '{0}'")]
    NoExtractableContent(String),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] crate::store::StoreError),

    #[error("Upload storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, DocparseError>;
