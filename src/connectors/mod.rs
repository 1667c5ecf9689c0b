/*!
 * External collaborator contracts.
 *
 * The orchestration core never talks to file storage, the translation
 * pipeline, or document formats directly; those live behind the traits in
 * this module. Mock implementations for tests are in `connectors::mock`.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::ConnectorError;

pub mod mock;

/// Supported document formats.
///
/// The orchestrator carries this as data and selects a `FormatAdapter` by
/// tag; it never branches on a concrete format itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Spreadsheet workbook
    Spreadsheet,
    /// Text document
    Document,
    /// Slide deck
    Presentation,
    /// PDF file
    Pdf,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Spreadsheet => write!(f, "spreadsheet"),
            FileType::Document => write!(f, "document"),
            FileType::Presentation => write!(f, "presentation"),
            FileType::Pdf => write!(f, "pdf"),
        }
    }
}

impl std::str::FromStr for FileType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spreadsheet" => Ok(FileType::Spreadsheet),
            "document" => Ok(FileType::Document),
            "presentation" => Ok(FileType::Presentation),
            "pdf" => Ok(FileType::Pdf),
            _ => Err(anyhow::anyhow!("Invalid file type: {}", s)),
        }
    }
}

/// File metadata resolved from a source URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedFile {
    /// Storage identifier
    pub file_id: String,
    /// Display name
    pub file_name: String,
    /// Detected format
    pub file_type: FileType,
}

/// Resolves and validates source file URLs
#[async_trait]
pub trait FileResolver: Send + Sync {
    /// Check whether a URL points at a processable file
    async fn validate(&self, url: &str) -> bool;

    /// Resolve URL to file metadata
    async fn resolve(&self, url: &str) -> Result<ResolvedFile, ConnectorError>;
}

/// Response from setting up translation of a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupResponse {
    /// Correlation id for the translation task
    pub task_id: String,
    /// Number of translation jobs the file was split into
    pub total_jobs: u32,
    /// URL of the translated output file
    pub target_file_url: String,
}

/// Prepares a single file for translation (copies the file, splits it into
/// jobs, registers the task with the translation pipeline)
#[async_trait]
pub trait TranslationSetup: Send + Sync {
    /// Set up translation of one file
    async fn prepare(
        &self,
        url: &str,
        target_language: &str,
        dict_name: &str,
    ) -> Result<SetupResponse, ConnectorError>;
}

/// Progress state of a translation task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Jobs remain
    Processing,
    /// Every job finished
    Complete,
    /// The task failed
    Error,
}

/// One advancement cycle of a translation task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAdvance {
    /// Task progress state
    pub status: JobStatus,
    /// Jobs finished so far
    pub completed_jobs: u32,
    /// Total jobs in the task
    pub total_jobs: u32,
    /// Output URL, present once complete
    pub target_file_url: Option<String>,
    /// Failure message when status is `Error`
    pub error_message: Option<String>,
}

/// Per-job driver that performs extraction, term matching and the LLM call.
/// The orchestrator invokes one cycle per poll.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Advance a translation task by one cycle
    async fn advance(&self, task_id: &str) -> Result<JobAdvance, ConnectorError>;
}

/// A unit of translatable content inside a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationJob {
    /// Position within the file
    pub index: u32,
    /// Extracted source text
    pub source_text: String,
    /// Translated text, filled by the pipeline
    pub translated_text: Option<String>,
}

/// Format capability interface: the same operations implemented per document
/// format, selected by `FileType`
#[async_trait]
pub trait FormatAdapter: Send + Sync {
    /// Split a file into translation jobs
    async fn create_jobs(&self, file_id: &str) -> Result<Vec<TranslationJob>, ConnectorError>;

    /// Write one translated job back into the output file
    async fn write_job(&self, file_id: &str, job: &TranslationJob) -> Result<(), ConnectorError>;

    /// Extract the translatable text of a file
    async fn extract_text(&self, file_id: &str) -> Result<Vec<String>, ConnectorError>;
}

/// Per-format adapter selection, keyed by the tagged file type.
///
/// Callers resolve the adapter for a file's type once and use the shared
/// capability interface from there on.
#[derive(Default)]
pub struct AdapterSet {
    adapters: HashMap<FileType, Arc<dyn FormatAdapter>>,
}

impl AdapterSet {
    /// Create an empty adapter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter for a file type
    pub fn register(mut self, file_type: FileType, adapter: Arc<dyn FormatAdapter>) -> Self {
        self.adapters.insert(file_type, adapter);
        self
    }

    /// Resolve the adapter for a file type
    pub fn for_type(&self, file_type: FileType) -> Option<Arc<dyn FormatAdapter>> {
        self.adapters.get(&file_type).cloned()
    }

    /// Whether a file type has an adapter registered
    pub fn supports(&self, file_type: FileType) -> bool {
        self.adapters.contains_key(&file_type)
    }
}
