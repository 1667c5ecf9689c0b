/*!
 * Batch and file-task records and operation outcome DTOs.
 *
 * These structures are what the orchestrator persists in the TTL state store
 * and returns from its operation surface. Progress counts are always derived
 * from the file-task list, never maintained incrementally, so
 * `processed == completed + failed` holds by construction.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::connectors::FileType;
use crate::errors::ErrorKind;

/// Batch lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Created, not yet started
    Pending,
    /// Actively advanced by poll calls
    Processing,
    /// Suspended; resumable
    Paused,
    /// Every file reached a terminal state
    Completed,
    /// Cancelled by request
    Cancelled,
}

impl BatchStatus {
    /// Terminal statuses admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Cancelled)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Pending => write!(f, "pending"),
            BatchStatus::Processing => write!(f, "processing"),
            BatchStatus::Paused => write!(f, "paused"),
            BatchStatus::Completed => write!(f, "completed"),
            BatchStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BatchStatus::Pending),
            "processing" => Ok(BatchStatus::Processing),
            "paused" => Ok(BatchStatus::Paused),
            "completed" => Ok(BatchStatus::Completed),
            "cancelled" => Ok(BatchStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid batch status: {}", s)),
        }
    }
}

/// File task status within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTaskStatus {
    /// Waiting to be picked up
    Pending,
    /// Translation in flight
    Processing,
    /// Failed recoverably; waiting to be picked up again
    Retrying,
    /// Translated successfully
    Completed,
    /// Failed permanently
    Failed,
    /// Batch was cancelled before the file finished
    Cancelled,
}

impl FileTaskStatus {
    /// Terminal statuses; `Retrying` is non-terminal and returns to processing
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileTaskStatus::Completed | FileTaskStatus::Failed | FileTaskStatus::Cancelled
        )
    }
}

impl fmt::Display for FileTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileTaskStatus::Pending => write!(f, "pending"),
            FileTaskStatus::Processing => write!(f, "processing"),
            FileTaskStatus::Retrying => write!(f, "retrying"),
            FileTaskStatus::Completed => write!(f, "completed"),
            FileTaskStatus::Failed => write!(f, "failed"),
            FileTaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for FileTaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(FileTaskStatus::Pending),
            "processing" => Ok(FileTaskStatus::Processing),
            "retrying" => Ok(FileTaskStatus::Retrying),
            "completed" => Ok(FileTaskStatus::Completed),
            "failed" => Ok(FileTaskStatus::Failed),
            "cancelled" => Ok(FileTaskStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid file task status: {}", s)),
        }
    }
}

/// One file's translation progress within a batch.
///
/// Created at batch creation from a validated URL; mutated only by the
/// orchestrator; terminal once completed, failed or cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTask {
    /// Stable position in the original input list
    pub index: usize,
    /// Source file URL
    pub source_url: String,
    /// Resolved storage identifier
    pub file_id: String,
    /// Resolved display name
    pub file_name: String,
    /// Resolved format
    pub file_type: FileType,
    /// Current status
    pub status: FileTaskStatus,
    /// Retries consumed so far
    pub retry_count: u32,
    /// Last error message
    pub error_message: Option<String>,
    /// Structured class of the last error
    pub error_kind: Option<ErrorKind>,
    /// Correlation id of the translation task
    pub task_id: Option<String>,
    /// URL of the translated output
    pub target_file_url: Option<String>,
    /// When translation of this file started (ISO 8601)
    pub started_at: Option<String>,
    /// When this file reached a terminal state
    pub completed_at: Option<String>,
    /// Processing duration in milliseconds
    pub duration_ms: Option<i64>,
}

impl FileTask {
    /// Create a pending file task from resolved metadata
    pub fn new(
        index: usize,
        source_url: String,
        file_id: String,
        file_name: String,
        file_type: FileType,
    ) -> Self {
        Self {
            index,
            source_url,
            file_id,
            file_name,
            file_type,
            status: FileTaskStatus::Pending,
            retry_count: 0,
            error_message: None,
            error_kind: None,
            task_id: None,
            target_file_url: None,
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }

    /// Whether the task is waiting to be picked up (pending or retrying)
    pub fn is_eligible(&self) -> bool {
        matches!(self.status, FileTaskStatus::Pending | FileTaskStatus::Retrying)
    }
}

/// A URL rejected at batch creation. Non-retryable by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidFile {
    /// The rejected URL
    pub url: String,
    /// Why it was rejected
    pub error: String,
}

/// A named group of file-translation requests sharing target language and
/// dictionary, tracked as one lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Unique batch identifier (UUID)
    pub id: String,
    /// Display name
    pub name: String,
    /// Target language code
    pub target_language: String,
    /// Dictionary used for term matching
    pub dictionary_name: String,
    /// Current status
    pub status: BatchStatus,
    /// File tasks, in input order
    pub files: Vec<FileTask>,
    /// URLs rejected at creation
    pub invalid_files: Vec<InvalidFile>,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// First start timestamp
    pub started_at: Option<String>,
    /// Last mutation timestamp
    pub last_updated: String,
    /// Last pause timestamp
    pub paused_at: Option<String>,
    /// Completion timestamp
    pub completed_at: Option<String>,
    /// Cancellation timestamp
    pub cancelled_at: Option<String>,
    /// Why the batch was cancelled
    pub cancel_reason: Option<String>,
    /// How many times the batch has been resumed
    pub resume_count: u32,
    /// Start-to-completion duration in milliseconds
    pub total_duration_ms: Option<i64>,
}

impl BatchRecord {
    /// Create a pending batch
    pub fn new(
        name: String,
        target_language: String,
        dictionary_name: String,
        files: Vec<FileTask>,
        invalid_files: Vec<InvalidFile>,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            target_language,
            dictionary_name,
            status: BatchStatus::Pending,
            files,
            invalid_files,
            created_at: now.clone(),
            started_at: None,
            last_updated: now,
            paused_at: None,
            completed_at: None,
            cancelled_at: None,
            cancel_reason: None,
            resume_count: 0,
            total_duration_ms: None,
        }
    }

    /// Record a mutation time
    pub fn touch(&mut self) {
        self.last_updated = Utc::now().to_rfc3339();
    }

    /// Total files submitted, including rejected URLs
    pub fn total_files(&self) -> usize {
        self.files.len() + self.invalid_files.len()
    }

    /// Files that passed URL validation
    pub fn valid_files(&self) -> usize {
        self.files.len()
    }

    /// URLs rejected at creation
    pub fn invalid_count(&self) -> usize {
        self.invalid_files.len()
    }

    /// Files translated successfully
    pub fn completed_files(&self) -> usize {
        self.count_status(FileTaskStatus::Completed)
    }

    /// Files failed permanently
    pub fn failed_files(&self) -> usize {
        self.count_status(FileTaskStatus::Failed)
    }

    /// Files that reached completed or failed
    pub fn processed_files(&self) -> usize {
        self.completed_files() + self.failed_files()
    }

    /// Files currently in flight
    pub fn processing_files(&self) -> usize {
        self.count_status(FileTaskStatus::Processing)
    }

    /// Files waiting for a retry
    pub fn retrying_files(&self) -> usize {
        self.count_status(FileTaskStatus::Retrying)
    }

    /// Whether any file can still make progress
    pub fn has_remaining_work(&self) -> bool {
        self.files.iter().any(|f| !f.status.is_terminal())
    }

    /// First file waiting to be picked up, in input order
    pub fn next_eligible(&self) -> Option<&FileTask> {
        self.files.iter().find(|f| f.is_eligible())
    }

    /// The file currently in flight, if any
    pub fn in_flight(&self) -> Option<&FileTask> {
        self.files
            .iter()
            .find(|f| f.status == FileTaskStatus::Processing && f.task_id.is_some())
    }

    /// Look up a file by its translation-task correlation id
    pub fn file_by_correlation(&mut self, correlation_id: &str) -> Option<&mut FileTask> {
        self.files
            .iter_mut()
            .find(|f| f.task_id.as_deref() == Some(correlation_id))
    }

    /// Minutes since the last mutation, when the timestamp parses
    pub fn minutes_since_update(&self) -> Option<i64> {
        parse_timestamp(&self.last_updated).map(|t| (Utc::now() - t).num_minutes())
    }

    /// Build the status summary DTO
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            batch_id: self.id.clone(),
            name: self.name.clone(),
            status: self.status,
            target_language: self.target_language.clone(),
            dictionary_name: self.dictionary_name.clone(),
            total_files: self.total_files(),
            valid_files: self.valid_files(),
            invalid_files: self.invalid_count(),
            processed_files: self.processed_files(),
            completed_files: self.completed_files(),
            failed_files: self.failed_files(),
            retrying_files: self.retrying_files(),
            created_at: self.created_at.clone(),
            last_updated: self.last_updated.clone(),
            resume_count: self.resume_count,
        }
    }

    fn count_status(&self, status: FileTaskStatus) -> usize {
        self.files.iter().filter(|f| f.status == status).count()
    }
}

/// Parse an ISO 8601 timestamp stored on a record
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Snapshot persisted on pause/resume for external inspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRecord {
    /// Batch this snapshot belongs to
    pub batch_id: String,
    /// Processed files at snapshot time
    pub processed_files: usize,
    /// Completed files at snapshot time
    pub completed_files: usize,
    /// Failed files at snapshot time
    pub failed_files: usize,
    /// Resumes so far
    pub resume_count: u32,
    /// When the snapshot was taken
    pub recorded_at: String,
}

/// Result reported by the caller for a finished file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    /// Whether the file translated successfully
    pub success: bool,
    /// Output URL on success
    pub target_file_url: Option<String>,
    /// Failure message on error
    pub error_message: Option<String>,
}

impl FileResult {
    /// Successful result with the translated file URL
    pub fn ok(target_file_url: impl Into<String>) -> Self {
        Self {
            success: true,
            target_file_url: Some(target_file_url.into()),
            error_message: None,
        }
    }

    /// Failed result with an error message
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            target_file_url: None,
            error_message: Some(message.into()),
        }
    }
}

/// Outcome of `create_batch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCreated {
    /// The new batch id
    pub batch_id: String,
    /// Total URLs submitted
    pub total_files: usize,
    /// URLs accepted as file tasks
    pub valid_files: usize,
    /// URLs rejected
    pub invalid_files: usize,
    /// Rejection details
    pub errors: Vec<InvalidFile>,
}

/// Outcome of `start_batch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartOutcome {
    /// The batch moved to processing
    Started,
    /// The batch was already processing
    AlreadyRunning,
}

/// A successfully translated file in a completion summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedFile {
    /// Stable input position
    pub index: usize,
    /// Source URL
    pub source_url: String,
    /// Translated output URL
    pub target_file_url: Option<String>,
}

/// Outcome of batch completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSummary {
    /// The completed batch id
    pub batch_id: String,
    /// Files translated successfully, with their URLs
    pub completed_file_list: Vec<CompletedFile>,
    /// Completed file count
    pub completed_files: usize,
    /// Failed file count
    pub failed_files: usize,
    /// Start-to-completion duration in milliseconds
    pub total_duration_ms: Option<i64>,
}

/// Outcome of `process_next_file`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// A file is in flight; poll again to advance it
    Processing {
        /// Index of the file being translated
        file_index: usize,
        /// Correlation id of the translation task
        task_id: String,
        /// Jobs finished so far
        completed_jobs: u32,
        /// Total jobs in the task
        total_jobs: u32,
    },
    /// The in-flight file finished during this cycle
    FileCompleted {
        /// Index of the finished file
        file_index: usize,
        /// Translated output URL
        target_file_url: Option<String>,
    },
    /// A file failed recoverably and will be retried
    FileRetrying {
        /// Index of the retried file
        file_index: usize,
        /// Retries consumed so far
        retry_count: u32,
        /// The error that caused the retry
        message: String,
    },
    /// A file failed permanently
    FileFailed {
        /// Index of the failed file
        file_index: usize,
        /// The terminal error
        message: String,
    },
    /// No pending or retrying files remain; the batch completed
    Completed(CompletionSummary),
    /// The batch is not in processing state; nothing was advanced
    NotProcessing {
        /// Current batch status
        batch_status: BatchStatus,
    },
}

/// Outcome of `on_file_completed`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// The file result was recorded; work remains
    Recorded {
        /// Index of the recorded file
        file_index: usize,
        /// New status of the file
        file_status: FileTaskStatus,
    },
    /// The recorded result was the last one; the batch completed
    Completed(CompletionSummary),
}

/// Outcome of `cancel_batch`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The batch was cancelled now
    Cancelled {
        /// Files moved to cancelled
        cancelled_files: usize,
    },
    /// The batch was already cancelled
    AlreadyCancelled,
}

/// Batch status summary DTO with derived counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Batch id
    pub batch_id: String,
    /// Display name
    pub name: String,
    /// Current status
    pub status: BatchStatus,
    /// Target language code
    pub target_language: String,
    /// Dictionary used for matching
    pub dictionary_name: String,
    /// Total URLs submitted
    pub total_files: usize,
    /// URLs accepted as file tasks
    pub valid_files: usize,
    /// URLs rejected at creation
    pub invalid_files: usize,
    /// Files that reached a processed state
    pub processed_files: usize,
    /// Files translated successfully
    pub completed_files: usize,
    /// Files failed permanently
    pub failed_files: usize,
    /// Files waiting for retry
    pub retrying_files: usize,
    /// Creation timestamp
    pub created_at: String,
    /// Last mutation timestamp
    pub last_updated: String,
    /// Resumes so far
    pub resume_count: u32,
}

/// Health verdict for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No issues
    Healthy,
    /// One or two issues
    Warning,
    /// More than two issues
    Unhealthy,
}

/// A single issue flagged by the health check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HealthIssue {
    /// Processing batch with no update inside the stale threshold
    Stale {
        /// Minutes since the last update
        minutes_since_update: i64,
    },
    /// More than half of processed files failed
    HighErrorRate {
        /// Failed files
        failed: usize,
        /// Processed files
        processed: usize,
    },
    /// More than three files waiting for retry
    RetryStorm {
        /// Files in retrying state
        retrying: usize,
    },
}

/// Outcome of `health_check`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Batch id
    pub batch_id: String,
    /// Overall verdict
    pub status: HealthStatus,
    /// Issues found
    pub issues: Vec<HealthIssue>,
}

/// A recovery step taken by `attempt_auto_recovery`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecoveryAction {
    /// A stuck in-flight file was requeued with a synthetic timeout error
    RequeuedStalled {
        /// Index of the requeued file
        file_index: usize,
    },
    /// A failed file with a retryable error was requeued
    RequeuedFailed {
        /// Index of the requeued file
        file_index: usize,
    },
}

/// Outcome of `attempt_auto_recovery`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Batch id
    pub batch_id: String,
    /// Steps taken; empty when nothing was recoverable
    pub actions: Vec<RecoveryAction>,
}

impl RecoveryReport {
    /// Whether the run could not recover anything
    pub fn no_recovery_possible(&self) -> bool {
        self.actions.is_empty()
    }
}

/// A file index that `retry_failed_files` could not requeue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryRejection {
    /// The requested file index
    pub index: usize,
    /// Why it could not be retried
    pub message: String,
}

/// Outcome of `retry_failed_files`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryReport {
    /// Indices successfully requeued
    pub requeued: Vec<usize>,
    /// Indices that could not be requeued, with reasons
    pub errors: Vec<RetryRejection>,
}
