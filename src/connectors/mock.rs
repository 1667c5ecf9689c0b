/*!
 * Mock connector implementations for testing.
 *
 * These simulate the external collaborators with scriptable behaviors:
 * - `MockResolver` - accepts well-formed URLs, rejects ones marked bad
 * - `MockSetup::working()` / `::failing(..)` / `::fail_first(n)` - setup outcomes
 * - `MockJobProcessor::completing_after(n)` - tasks that finish after n cycles
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;
use uuid::Uuid;

use crate::connectors::{
    FileResolver, FileType, FormatAdapter, JobAdvance, JobProcessor, JobStatus, ResolvedFile,
    SetupResponse, TranslationJob, TranslationSetup,
};
use crate::errors::{ConnectorError, ErrorKind};

/// Marker substring that makes `MockResolver` reject a URL
const BAD_URL_MARKER: &str = "bad";

/// Mock file resolver.
///
/// A URL is valid when it does not contain the `bad` marker. Metadata is
/// derived from the URL path when it parses as a real URL, from the raw
/// string otherwise.
#[derive(Debug, Default)]
pub struct MockResolver {
    validate_calls: AtomicUsize,
}

impl MockResolver {
    /// Create a resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of validate calls observed
    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileResolver for MockResolver {
    async fn validate(&self, url: &str) -> bool {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        !url.is_empty() && !url.contains(BAD_URL_MARKER)
    }

    async fn resolve(&self, url: &str) -> Result<ResolvedFile, ConnectorError> {
        if url.is_empty() || url.contains(BAD_URL_MARKER) {
            return Err(ConnectorError::validation(format!("invalid URL: {}", url)));
        }

        let file_name = Url::parse(url)
            .ok()
            .and_then(|parsed| {
                parsed
                    .path_segments()
                    .and_then(|segments| segments.last().map(|s| s.to_string()))
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| url.to_string());

        let file_type = if file_name.ends_with(".pdf") {
            FileType::Pdf
        } else if file_name.ends_with(".xlsx") {
            FileType::Spreadsheet
        } else if file_name.ends_with(".pptx") {
            FileType::Presentation
        } else {
            FileType::Document
        };

        Ok(ResolvedFile {
            file_id: format!("file-{}", Uuid::new_v4()),
            file_name,
            file_type,
        })
    }
}

/// Behavior mode for `MockSetup`
#[derive(Debug, Clone)]
pub enum SetupBehavior {
    /// Always succeeds
    Working,
    /// Always fails with the given error
    Failing(ConnectorError),
    /// Fails the first `n` calls with the given error, then succeeds
    FailFirst(usize, ConnectorError),
}

/// Mock translation setup collaborator
#[derive(Debug)]
pub struct MockSetup {
    behavior: SetupBehavior,
    call_count: AtomicUsize,
    jobs_per_file: u32,
}

impl MockSetup {
    /// Create a setup mock with the given behavior
    pub fn new(behavior: SetupBehavior) -> Self {
        Self {
            behavior,
            call_count: AtomicUsize::new(0),
            jobs_per_file: 3,
        }
    }

    /// Setup that always succeeds
    pub fn working() -> Self {
        Self::new(SetupBehavior::Working)
    }

    /// Setup that always fails with the given kind and message
    pub fn failing(kind: ErrorKind, message: &str) -> Self {
        Self::new(SetupBehavior::Failing(ConnectorError::new(kind, message)))
    }

    /// Setup that always fails with a free-text message, classified at the
    /// boundary like a real upstream response
    pub fn failing_with_message(message: &str) -> Self {
        Self::new(SetupBehavior::Failing(ConnectorError::from_message(message)))
    }

    /// Setup that fails `n` times with a transient error, then succeeds
    pub fn fail_first(n: usize) -> Self {
        Self::new(SetupBehavior::FailFirst(
            n,
            ConnectorError::transient("ネットワークエラー: connection reset"),
        ))
    }

    /// Number of prepare calls observed
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationSetup for MockSetup {
    async fn prepare(
        &self,
        url: &str,
        _target_language: &str,
        _dict_name: &str,
    ) -> Result<SetupResponse, ConnectorError> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            SetupBehavior::Working => {}
            SetupBehavior::Failing(err) => return Err(err.clone()),
            SetupBehavior::FailFirst(n, err) => {
                if call < *n {
                    return Err(err.clone());
                }
            }
        }

        Ok(SetupResponse {
            task_id: format!("task-{}", Uuid::new_v4()),
            total_jobs: self.jobs_per_file,
            target_file_url: format!("{}?translated", url),
        })
    }
}

/// Behavior mode for `MockJobProcessor`
#[derive(Debug, Clone, Copy)]
pub enum JobBehavior {
    /// Each task completes after the given number of advance cycles
    CompletingAfter(u32),
    /// Every advance reports a task error with a transient message
    Erroring,
}

/// Mock per-job driver. Tracks per-task progress across advance calls.
#[derive(Debug)]
pub struct MockJobProcessor {
    behavior: JobBehavior,
    progress: Mutex<HashMap<String, u32>>,
    total_jobs: u32,
}

impl MockJobProcessor {
    /// Driver whose tasks complete after `cycles` advance calls
    pub fn completing_after(cycles: u32) -> Self {
        Self {
            behavior: JobBehavior::CompletingAfter(cycles),
            progress: Mutex::new(HashMap::new()),
            total_jobs: cycles,
        }
    }

    /// Driver whose tasks always error
    pub fn erroring() -> Self {
        Self {
            behavior: JobBehavior::Erroring,
            progress: Mutex::new(HashMap::new()),
            total_jobs: 3,
        }
    }
}

#[async_trait]
impl JobProcessor for MockJobProcessor {
    async fn advance(&self, task_id: &str) -> Result<JobAdvance, ConnectorError> {
        match self.behavior {
            JobBehavior::Erroring => Ok(JobAdvance {
                status: JobStatus::Error,
                completed_jobs: 0,
                total_jobs: self.total_jobs,
                target_file_url: None,
                error_message: Some("APIエラー: upstream failure".to_string()),
            }),
            JobBehavior::CompletingAfter(cycles) => {
                let mut progress = self.progress.lock();
                let done = progress.entry(task_id.to_string()).or_insert(0);
                *done += 1;

                if *done >= cycles {
                    Ok(JobAdvance {
                        status: JobStatus::Complete,
                        completed_jobs: cycles,
                        total_jobs: cycles,
                        target_file_url: Some(format!("translated://{}", task_id)),
                        error_message: None,
                    })
                } else {
                    Ok(JobAdvance {
                        status: JobStatus::Processing,
                        completed_jobs: *done,
                        total_jobs: cycles,
                        target_file_url: None,
                        error_message: None,
                    })
                }
            }
        }
    }
}

/// Mock format adapter backed by an in-memory text table.
///
/// Files contain one segment per source line; `write_job` records the
/// translated text so tests can assert on the written output.
#[derive(Debug, Default)]
pub struct MockFormatAdapter {
    sources: Mutex<HashMap<String, Vec<String>>>,
    written: Mutex<HashMap<String, Vec<TranslationJob>>>,
}

impl MockFormatAdapter {
    /// Create an adapter with no files
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file's source segments
    pub fn with_file(self, file_id: &str, segments: &[&str]) -> Self {
        self.sources.lock().insert(
            file_id.to_string(),
            segments.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Jobs written back for a file so far
    pub fn written_jobs(&self, file_id: &str) -> Vec<TranslationJob> {
        self.written.lock().get(file_id).cloned().unwrap_or_default()
    }

    fn segments(&self, file_id: &str) -> Result<Vec<String>, ConnectorError> {
        self.sources
            .lock()
            .get(file_id)
            .cloned()
            .ok_or_else(|| {
                ConnectorError::validation(format!("ファイルが見つかりません: {}", file_id))
            })
    }
}

#[async_trait]
impl FormatAdapter for MockFormatAdapter {
    async fn create_jobs(&self, file_id: &str) -> Result<Vec<TranslationJob>, ConnectorError> {
        let jobs = self
            .segments(file_id)?
            .into_iter()
            .enumerate()
            .map(|(index, source_text)| TranslationJob {
                index: index as u32,
                source_text,
                translated_text: None,
            })
            .collect();
        Ok(jobs)
    }

    async fn write_job(&self, file_id: &str, job: &TranslationJob) -> Result<(), ConnectorError> {
        self.segments(file_id)?;
        self.written
            .lock()
            .entry(file_id.to_string())
            .or_default()
            .push(job.clone());
        Ok(())
    }

    async fn extract_text(&self, file_id: &str) -> Result<Vec<String>, ConnectorError> {
        self.segments(file_id)
    }
}
