use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::fields::FieldSpec;

/// One explicit configuration structure, constructed once and passed into
/// each component's constructor. Nothing in the crate reads the process
/// environment directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the SQLite database lives.
    pub database_path: PathBuf,
    /// Where raw uploaded bytes are kept, one file per parsed-file id.
    pub storage_directory: PathBuf,
    /// Worker pool size. Bounded by how many cloud OCR calls may run
    /// concurrently, which is the binding constraint of the pipeline.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub pdf: PdfConfig,
    /// Optional field-spec table for the structured view. When absent the
    /// built-in payslip table is used.
    #[serde(default)]
    pub fields: Option<Vec<FieldSpec>>,
}

fn default_worker_count() -> usize {
    num_cpus::get().min(4)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Cloud engine settings. When absent only the local engine runs.
    #[serde(default)]
    pub cloud: Option<CloudOcrConfig>,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_dpi() -> u32 {
    300
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            cloud: None,
            languages: default_languages(),
            dpi: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudOcrConfig {
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_endpoint() -> String {
    "https://vision.googleapis.com/v1/images:annotate".to_string()
}

fn default_timeout_ms() -> u64 {
    15_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    /// Pages whose embedded text is shorter than this are treated as
    /// scanned images and routed to OCR.
    #[serde(default = "default_min_native_chars")]
    pub min_native_chars: usize,
}

fn default_min_native_chars() -> usize {
    25
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_native_chars: default_min_native_chars(),
        }
    }
}
