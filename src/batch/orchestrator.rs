/*!
 * Batch orchestration over the TTL state store.
 *
 * The orchestrator is a state machine over `BatchRecord`
 * (`pending → processing ⇄ paused`, `processing|paused → cancelled`,
 * `processing → completed`), driven entirely by repeated external calls.
 * There is no background execution: `process_next_file` advances at most one
 * file by one cycle, and cancellation takes effect on the next poll.
 *
 * Every mutation is a read-modify-write committed through compare-and-swap
 * with a bounded retry loop, so two callers racing on one batch id retry
 * instead of losing an update.
 */

use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;

use crate::app_config::BatchConfig;
use crate::batch::models::{
    parse_timestamp, BatchCreated, BatchRecord, BatchStatus, BatchSummary, CancelOutcome,
    CompletedFile, CompletionOutcome, CompletionSummary, FileResult, FileTask, FileTaskStatus,
    HealthIssue, HealthReport, HealthStatus, InvalidFile, ProcessOutcome, RecoveryAction,
    RecoveryReport, ResumeRecord, RetryRejection, RetryReport, StartOutcome,
};
use crate::connectors::{FileResolver, JobProcessor, JobStatus, TranslationSetup};
use crate::errors::{should_retry, BatchError, ErrorKind, StoreError};
use crate::store::StateStore;

/// CAS attempts before reporting contention
const MAX_CAS_RETRIES: usize = 5;

/// Synthetic error recorded when auto-recovery requeues a stuck file
const STALL_TIMEOUT_MESSAGE: &str = "タイムアウト: processing stalled";

/// Batch lifecycle orchestrator
pub struct BatchOrchestrator {
    store: Arc<dyn StateStore>,
    resolver: Arc<dyn FileResolver>,
    setup: Arc<dyn TranslationSetup>,
    jobs: Arc<dyn JobProcessor>,
    config: BatchConfig,
}

impl BatchOrchestrator {
    /// Create an orchestrator over the given store and collaborators
    pub fn new(
        store: Arc<dyn StateStore>,
        resolver: Arc<dyn FileResolver>,
        setup: Arc<dyn TranslationSetup>,
        jobs: Arc<dyn JobProcessor>,
        config: BatchConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            setup,
            jobs,
            config,
        }
    }

    // =========================================================================
    // Batch Creation and Lifecycle
    // =========================================================================

    /// Validate URLs and store a new pending batch.
    ///
    /// Valid URLs become file tasks with their position in the input list as
    /// a stable index; invalid ones are recorded as non-retryable errors.
    /// Processing does not start until `start_batch`.
    pub async fn create_batch(
        &self,
        urls: &[String],
        target_language: &str,
        dict_name: &str,
        name: &str,
    ) -> Result<BatchCreated, BatchError> {
        let mut files: Vec<FileTask> = Vec::new();
        let mut invalid: Vec<InvalidFile> = Vec::new();

        for (index, url) in urls.iter().enumerate() {
            if !self.resolver.validate(url).await {
                invalid.push(InvalidFile {
                    url: url.clone(),
                    error: format!("invalid URL: {}", url),
                });
                continue;
            }
            match self.resolver.resolve(url).await {
                Ok(resolved) => files.push(FileTask::new(
                    index,
                    url.clone(),
                    resolved.file_id,
                    resolved.file_name,
                    resolved.file_type,
                )),
                Err(err) => invalid.push(InvalidFile {
                    url: url.clone(),
                    error: err.message,
                }),
            }
        }

        let record = BatchRecord::new(
            name.to_string(),
            target_language.to_string(),
            dict_name.to_string(),
            files,
            invalid,
        );

        info!(
            "created batch {} '{}' ({} valid, {} invalid)",
            &record.id[..8],
            record.name,
            record.valid_files(),
            record.invalid_count()
        );

        let created = BatchCreated {
            batch_id: record.id.clone(),
            total_files: record.total_files(),
            valid_files: record.valid_files(),
            invalid_files: record.invalid_count(),
            errors: record.invalid_files.clone(),
        };

        let value = serde_json::to_value(&record).map_err(StoreError::from)?;
        self.store.put(
            &Self::batch_key(&record.id),
            value,
            self.config.record_ttl_seconds,
        );

        Ok(created)
    }

    /// Move a pending or paused batch to processing.
    ///
    /// Idempotent no-op when the batch is already processing.
    pub fn start_batch(&self, batch_id: &str) -> Result<StartOutcome, BatchError> {
        let (record, _) = self.load(batch_id)?;
        match record.status {
            BatchStatus::Processing => return Ok(StartOutcome::AlreadyRunning),
            BatchStatus::Pending | BatchStatus::Paused => {}
            status => {
                return Err(BatchError::InvalidState {
                    id: batch_id.to_string(),
                    status: status.to_string(),
                    reason: "only pending or paused batches can start".to_string(),
                })
            }
        }

        self.mutate(batch_id, |record| {
            match record.status {
                BatchStatus::Processing => Ok((StartOutcome::AlreadyRunning, false)),
                BatchStatus::Pending | BatchStatus::Paused => {
                    record.status = BatchStatus::Processing;
                    if record.started_at.is_none() {
                        record.started_at = Some(Utc::now().to_rfc3339());
                    }
                    Ok((StartOutcome::Started, true))
                }
                status => Err(BatchError::InvalidState {
                    id: record.id.clone(),
                    status: status.to_string(),
                    reason: "only pending or paused batches can start".to_string(),
                }),
            }
        })
    }

    /// Advance the batch by one cycle.
    ///
    /// When a file is in flight, its translation task advances one job cycle.
    /// Otherwise the first pending or retrying file (by input index) is
    /// claimed and handed to the setup collaborator. When nothing remains,
    /// the batch completes. File-level failures never abort the batch; only
    /// the specific file transitions.
    pub async fn process_next_file(&self, batch_id: &str) -> Result<ProcessOutcome, BatchError> {
        let (record, _) = self.load(batch_id)?;
        if record.status != BatchStatus::Processing {
            debug!("batch {} not processing ({})", &batch_id[..8], record.status);
            return Ok(ProcessOutcome::NotProcessing {
                batch_status: record.status,
            });
        }

        if let Some(file) = record.in_flight() {
            if let Some(task_id) = file.task_id.clone() {
                return self.advance_in_flight(batch_id, file.index, &task_id).await;
            }
        }

        let Some(next) = record.next_eligible() else {
            // A claimed file with no correlation id means setup never finished;
            // push it through the retry policy instead of completing past it
            if let Some(stuck) = record
                .files
                .iter()
                .find(|f| f.status == FileTaskStatus::Processing && f.task_id.is_none())
            {
                return self.record_file_error(
                    batch_id,
                    stuck.index,
                    "translation setup did not record a task id",
                    ErrorKind::Unclassified,
                );
            }
            let summary = self.complete_batch(batch_id)?;
            return Ok(ProcessOutcome::Completed(summary));
        };
        let index = next.index;
        let url = next.source_url.clone();

        // Claim before calling out; CAS makes a double claim impossible
        self.mutate(batch_id, |record| {
            let file = Self::file_at(record, index)?;
            if !file.is_eligible() {
                return Err(BatchError::Contention(record.id.clone()));
            }
            file.status = FileTaskStatus::Processing;
            file.started_at = Some(Utc::now().to_rfc3339());
            Ok(((), true))
        })?;

        match self
            .setup
            .prepare(&url, &record.target_language, &record.dictionary_name)
            .await
        {
            Ok(response) => {
                let task_id = response.task_id.clone();
                let total_jobs = response.total_jobs;
                self.mutate(batch_id, |record| {
                    let file = Self::file_at(record, index)?;
                    file.task_id = Some(task_id.clone());
                    file.target_file_url = Some(response.target_file_url.clone());
                    Ok(((), true))
                })?;

                debug!(
                    "batch {} file {} set up as task {}",
                    &batch_id[..8],
                    index,
                    task_id
                );
                Ok(ProcessOutcome::Processing {
                    file_index: index,
                    task_id,
                    completed_jobs: 0,
                    total_jobs,
                })
            }
            Err(err) => self.record_file_error(batch_id, index, &err.message, err.kind),
        }
    }

    /// Record the final result of a file's translation task.
    ///
    /// The file is looked up by its correlation id. When the last
    /// non-terminal file resolves, the batch completes.
    pub fn on_file_completed(
        &self,
        batch_id: &str,
        correlation_id: &str,
        result: &FileResult,
    ) -> Result<CompletionOutcome, BatchError> {
        let (file_index, file_status) = self.mutate(batch_id, |record| {
            let batch_id = record.id.clone();
            let file = record.file_by_correlation(correlation_id).ok_or_else(|| {
                BatchError::FileNotFound {
                    batch_id,
                    correlation_id: correlation_id.to_string(),
                }
            })?;

            if result.success {
                Self::mark_completed(file, result.target_file_url.clone());
            } else {
                let message = result
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "translation failed".to_string());
                Self::mark_failed(file, &message, ErrorKind::classify_message(&message));
            }
            Ok(((file.index, file.status), true))
        })?;

        let (record, _) = self.load(batch_id)?;
        if !record.has_remaining_work() {
            let summary = self.complete_batch(batch_id)?;
            return Ok(CompletionOutcome::Completed(summary));
        }

        Ok(CompletionOutcome::Recorded {
            file_index,
            file_status,
        })
    }

    /// Pause a processing batch, persisting a resume snapshot
    pub fn pause_batch(&self, batch_id: &str) -> Result<BatchSummary, BatchError> {
        let summary = self.mutate(batch_id, |record| {
            if record.status != BatchStatus::Processing {
                return Err(BatchError::InvalidState {
                    id: record.id.clone(),
                    status: record.status.to_string(),
                    reason: "only processing batches can pause".to_string(),
                });
            }
            record.status = BatchStatus::Paused;
            record.paused_at = Some(Utc::now().to_rfc3339());
            Ok((record.summary(), true))
        })?;

        self.write_resume_record(&summary);
        info!("paused batch {}", &batch_id[..8]);
        Ok(summary)
    }

    /// Resume a paused batch, incrementing the resume counter
    pub fn resume_batch(&self, batch_id: &str) -> Result<BatchSummary, BatchError> {
        let summary = self.mutate(batch_id, |record| {
            if record.status != BatchStatus::Paused {
                return Err(BatchError::InvalidState {
                    id: record.id.clone(),
                    status: record.status.to_string(),
                    reason: "only paused batches can resume".to_string(),
                });
            }
            record.status = BatchStatus::Processing;
            record.resume_count += 1;
            Ok((record.summary(), true))
        })?;

        self.write_resume_record(&summary);
        info!(
            "resumed batch {} (resume #{})",
            &batch_id[..8],
            summary.resume_count
        );
        Ok(summary)
    }

    /// Cancel a batch, marking every non-terminal file cancelled.
    ///
    /// Idempotent: a second call reports `AlreadyCancelled`.
    pub fn cancel_batch(
        &self,
        batch_id: &str,
        reason: &str,
    ) -> Result<CancelOutcome, BatchError> {
        let (record, _) = self.load(batch_id)?;
        match record.status {
            BatchStatus::Cancelled => return Ok(CancelOutcome::AlreadyCancelled),
            BatchStatus::Completed => {
                return Err(BatchError::InvalidState {
                    id: batch_id.to_string(),
                    status: record.status.to_string(),
                    reason: "completed batches cannot be cancelled".to_string(),
                })
            }
            _ => {}
        }

        self.mutate(batch_id, |record| {
            if record.status == BatchStatus::Cancelled {
                return Ok((CancelOutcome::AlreadyCancelled, false));
            }

            let mut cancelled_files = 0;
            for file in record.files.iter_mut() {
                if !file.status.is_terminal() {
                    file.status = FileTaskStatus::Cancelled;
                    cancelled_files += 1;
                }
            }

            record.status = BatchStatus::Cancelled;
            record.cancelled_at = Some(Utc::now().to_rfc3339());
            record.cancel_reason = Some(reason.to_string());

            info!(
                "cancelled batch {} ({} files): {}",
                &record.id[..8],
                cancelled_files,
                reason
            );
            Ok((CancelOutcome::Cancelled { cancelled_files }, true))
        })
    }

    /// Mark a batch completed and return its completion summary.
    ///
    /// Idempotent on an already completed batch.
    pub fn complete_batch(&self, batch_id: &str) -> Result<CompletionSummary, BatchError> {
        self.mutate(batch_id, |record| {
            match record.status {
                BatchStatus::Completed => Ok((Self::completion_summary(record), false)),
                BatchStatus::Cancelled => Err(BatchError::InvalidState {
                    id: record.id.clone(),
                    status: record.status.to_string(),
                    reason: "cancelled batches cannot complete".to_string(),
                }),
                _ => {
                    let now = Utc::now();
                    record.status = BatchStatus::Completed;
                    record.completed_at = Some(now.to_rfc3339());
                    record.total_duration_ms = record
                        .started_at
                        .as_deref()
                        .or(Some(record.created_at.as_str()))
                        .and_then(parse_timestamp)
                        .map(|start| (now - start).num_milliseconds());

                    info!(
                        "completed batch {} ({} completed, {} failed)",
                        &record.id[..8],
                        record.completed_files(),
                        record.failed_files()
                    );
                    Ok((Self::completion_summary(record), true))
                }
            }
        })
    }

    /// Current batch summary with derived counts
    pub fn get_batch_status(&self, batch_id: &str) -> Result<BatchSummary, BatchError> {
        let (record, _) = self.load(batch_id)?;
        Ok(record.summary())
    }

    /// Summaries of every live batch in the store
    pub fn list_batches(&self) -> Vec<BatchSummary> {
        self.store
            .keys_with_prefix("batch_")
            .iter()
            .filter_map(|key| self.store.get(key))
            .filter_map(|record| serde_json::from_value::<BatchRecord>(record.value).ok())
            .map(|record| record.summary())
            .collect()
    }

    // =========================================================================
    // Health and Recovery
    // =========================================================================

    /// Inspect a batch for stuck or degraded processing.
    ///
    /// Advisory only; nothing is mutated.
    pub fn health_check(&self, batch_id: &str) -> Result<HealthReport, BatchError> {
        let (record, _) = self.load(batch_id)?;
        let mut issues: Vec<HealthIssue> = Vec::new();

        if record.status == BatchStatus::Processing {
            if let Some(minutes) = record.minutes_since_update() {
                if minutes > self.config.stale_threshold_minutes {
                    issues.push(HealthIssue::Stale {
                        minutes_since_update: minutes,
                    });
                }
            }
        }

        let processed = record.processed_files();
        let failed = record.failed_files();
        if processed > 3 && failed as f64 / processed as f64 > 0.5 {
            issues.push(HealthIssue::HighErrorRate { failed, processed });
        }

        let retrying = record.retrying_files();
        if retrying > 3 {
            issues.push(HealthIssue::RetryStorm { retrying });
        }

        let status = match issues.len() {
            0 => HealthStatus::Healthy,
            1..=2 => HealthStatus::Warning,
            _ => HealthStatus::Unhealthy,
        };

        Ok(HealthReport {
            batch_id: batch_id.to_string(),
            status,
            issues,
        })
    }

    /// Requeue work a stuck batch can still recover.
    ///
    /// Stuck in-flight files (started before the stale threshold) are
    /// requeued with a synthetic timeout error. Failed files with a
    /// retryable error class and retries left are requeued, at most
    /// `auto_recovery_limit` per call.
    pub fn attempt_auto_recovery(&self, batch_id: &str) -> Result<RecoveryReport, BatchError> {
        let stale_threshold = self.config.stale_threshold_minutes;
        let recovery_limit = self.config.auto_recovery_limit;
        let max_retries = self.config.max_retry_attempts;

        let report = self.mutate(batch_id, |record| {
            let mut actions: Vec<RecoveryAction> = Vec::new();
            let now = Utc::now();

            let stale = record.status == BatchStatus::Processing
                && record
                    .minutes_since_update()
                    .is_some_and(|m| m > stale_threshold);

            if stale {
                for file in record.files.iter_mut() {
                    if file.status != FileTaskStatus::Processing {
                        continue;
                    }
                    let stuck = file
                        .started_at
                        .as_deref()
                        .and_then(parse_timestamp)
                        .is_some_and(|t| (now - t).num_minutes() > stale_threshold);
                    if stuck {
                        file.status = FileTaskStatus::Retrying;
                        file.retry_count += 1;
                        file.error_message = Some(STALL_TIMEOUT_MESSAGE.to_string());
                        file.error_kind = Some(ErrorKind::Transient);
                        file.task_id = None;
                        actions.push(RecoveryAction::RequeuedStalled {
                            file_index: file.index,
                        });
                    }
                }
            }

            let mut requeued = 0;
            for file in record.files.iter_mut() {
                if requeued >= recovery_limit {
                    break;
                }
                if file.status != FileTaskStatus::Failed {
                    continue;
                }
                let retryable = file
                    .error_kind
                    .map_or(true, |kind| kind != ErrorKind::Validation)
                    && file.retry_count < max_retries;
                if retryable {
                    file.status = FileTaskStatus::Retrying;
                    file.completed_at = None;
                    file.duration_ms = None;
                    actions.push(RecoveryAction::RequeuedFailed {
                        file_index: file.index,
                    });
                    requeued += 1;
                }
            }

            let dirty = !actions.is_empty();
            Ok((
                RecoveryReport {
                    batch_id: record.id.clone(),
                    actions,
                },
                dirty,
            ))
        })?;

        if report.no_recovery_possible() {
            debug!("no recovery possible for batch {}", &batch_id[..8]);
        } else {
            info!(
                "recovered batch {}: {} actions",
                &batch_id[..8],
                report.actions.len()
            );
        }
        Ok(report)
    }

    /// Manually requeue failed files by index.
    ///
    /// Files that are not failed, unknown, or out of retries are reported in
    /// the per-index error list.
    pub fn retry_failed_files(
        &self,
        batch_id: &str,
        indices: &[usize],
    ) -> Result<RetryReport, BatchError> {
        let max_retries = self.config.max_retry_attempts;

        self.mutate(batch_id, |record| {
            let mut report = RetryReport {
                requeued: Vec::new(),
                errors: Vec::new(),
            };

            for &index in indices {
                let Some(file) = record.files.iter_mut().find(|f| f.index == index) else {
                    report.errors.push(RetryRejection {
                        index,
                        message: "no such file index".to_string(),
                    });
                    continue;
                };
                if file.status != FileTaskStatus::Failed {
                    report.errors.push(RetryRejection {
                        index,
                        message: format!("file is {}, not failed", file.status),
                    });
                    continue;
                }
                if file.retry_count >= max_retries {
                    report.errors.push(RetryRejection {
                        index,
                        message: format!("retry limit reached ({})", file.retry_count),
                    });
                    continue;
                }

                file.status = FileTaskStatus::Retrying;
                file.completed_at = None;
                file.duration_ms = None;
                report.requeued.push(index);
            }

            let dirty = !report.requeued.is_empty();
            Ok((report, dirty))
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn advance_in_flight(
        &self,
        batch_id: &str,
        index: usize,
        task_id: &str,
    ) -> Result<ProcessOutcome, BatchError> {
        match self.jobs.advance(task_id).await {
            Ok(advance) => match advance.status {
                JobStatus::Processing => {
                    // Touch so progress is visible to stale detection
                    self.mutate(batch_id, |_| Ok(((), true)))?;
                    Ok(ProcessOutcome::Processing {
                        file_index: index,
                        task_id: task_id.to_string(),
                        completed_jobs: advance.completed_jobs,
                        total_jobs: advance.total_jobs,
                    })
                }
                JobStatus::Complete => {
                    let target_url = advance.target_file_url.clone();
                    self.mutate(batch_id, |record| {
                        let file = Self::file_at(record, index)?;
                        Self::mark_completed(file, target_url.clone());
                        Ok(((), true))
                    })?;

                    let (record, _) = self.load(batch_id)?;
                    if !record.has_remaining_work() {
                        let summary = self.complete_batch(batch_id)?;
                        return Ok(ProcessOutcome::Completed(summary));
                    }
                    Ok(ProcessOutcome::FileCompleted {
                        file_index: index,
                        target_file_url: advance.target_file_url,
                    })
                }
                JobStatus::Error => {
                    let message = advance
                        .error_message
                        .unwrap_or_else(|| "translation task failed".to_string());
                    let kind = ErrorKind::classify_message(&message);
                    self.record_file_error(batch_id, index, &message, kind)
                }
            },
            Err(err) => self.record_file_error(batch_id, index, &err.message, err.kind),
        }
    }

    /// Classify a file failure into retry or terminal failure
    fn record_file_error(
        &self,
        batch_id: &str,
        index: usize,
        message: &str,
        kind: ErrorKind,
    ) -> Result<ProcessOutcome, BatchError> {
        let max_retries = self.config.max_retry_attempts;

        self.mutate(batch_id, |record| {
            let id_prefix = record.id[..8].to_string();
            let file = Self::file_at(record, index)?;

            if should_retry(kind, file.retry_count, max_retries) {
                file.retry_count += 1;
                file.status = FileTaskStatus::Retrying;
                file.error_message = Some(message.to_string());
                file.error_kind = Some(kind);
                file.task_id = None;
                warn!(
                    "file {} of batch {} retrying ({}): {}",
                    index,
                    &id_prefix[..8],
                    file.retry_count,
                    message
                );
                Ok((
                    ProcessOutcome::FileRetrying {
                        file_index: index,
                        retry_count: file.retry_count,
                        message: message.to_string(),
                    },
                    true,
                ))
            } else {
                Self::mark_failed(file, message, kind);
                warn!(
                    "file {} of batch {} failed terminally: {}",
                    index,
                    &id_prefix[..8],
                    message
                );
                Ok((
                    ProcessOutcome::FileFailed {
                        file_index: index,
                        message: message.to_string(),
                    },
                    true,
                ))
            }
        })
    }

    fn mark_completed(file: &mut FileTask, target_file_url: Option<String>) {
        let now = Utc::now();
        file.status = FileTaskStatus::Completed;
        if target_file_url.is_some() {
            file.target_file_url = target_file_url;
        }
        file.completed_at = Some(now.to_rfc3339());
        file.duration_ms = file
            .started_at
            .as_deref()
            .and_then(parse_timestamp)
            .map(|start| (now - start).num_milliseconds());
        file.error_message = None;
        file.error_kind = None;
    }

    fn mark_failed(file: &mut FileTask, message: &str, kind: ErrorKind) {
        let now = Utc::now();
        file.status = FileTaskStatus::Failed;
        file.completed_at = Some(now.to_rfc3339());
        file.duration_ms = file
            .started_at
            .as_deref()
            .and_then(parse_timestamp)
            .map(|start| (now - start).num_milliseconds());
        file.error_message = Some(message.to_string());
        file.error_kind = Some(kind);
    }

    fn completion_summary(record: &BatchRecord) -> CompletionSummary {
        let completed_file_list: Vec<CompletedFile> = record
            .files
            .iter()
            .filter(|f| f.status == FileTaskStatus::Completed)
            .map(|f| CompletedFile {
                index: f.index,
                source_url: f.source_url.clone(),
                target_file_url: f.target_file_url.clone(),
            })
            .collect();

        CompletionSummary {
            batch_id: record.id.clone(),
            completed_files: completed_file_list.len(),
            failed_files: record.failed_files(),
            completed_file_list,
            total_duration_ms: record.total_duration_ms,
        }
    }

    fn file_at<'a>(
        record: &'a mut BatchRecord,
        index: usize,
    ) -> Result<&'a mut FileTask, BatchError> {
        let batch_id = record.id.clone();
        record
            .files
            .iter_mut()
            .find(|f| f.index == index)
            .ok_or_else(|| BatchError::FileNotFound {
                batch_id,
                correlation_id: format!("index {}", index),
            })
    }

    fn batch_key(batch_id: &str) -> String {
        format!("batch_{}", batch_id)
    }

    fn resume_key(batch_id: &str) -> String {
        format!("resume_{}", batch_id)
    }

    fn load(&self, batch_id: &str) -> Result<(BatchRecord, u64), BatchError> {
        let record = self
            .store
            .get(&Self::batch_key(batch_id))
            .ok_or_else(|| BatchError::NotFound(batch_id.to_string()))?;
        let batch: BatchRecord =
            serde_json::from_value(record.value).map_err(StoreError::from)?;
        Ok((batch, record.version))
    }

    /// Read-modify-write with compare-and-swap and bounded retries.
    ///
    /// The closure returns the outcome and whether the record was dirtied;
    /// clean outcomes skip the write so no-ops do not refresh `last_updated`.
    fn mutate<T>(
        &self,
        batch_id: &str,
        mut op: impl FnMut(&mut BatchRecord) -> Result<(T, bool), BatchError>,
    ) -> Result<T, BatchError> {
        for _ in 0..MAX_CAS_RETRIES {
            let (mut record, version) = self.load(batch_id)?;
            let (outcome, dirty) = op(&mut record)?;
            if !dirty {
                return Ok(outcome);
            }

            record.touch();
            let value = serde_json::to_value(&record).map_err(StoreError::from)?;
            match self.store.compare_and_swap(
                &Self::batch_key(batch_id),
                version,
                value,
                self.config.record_ttl_seconds,
            ) {
                Ok(_) => return Ok(outcome),
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(StoreError::Missing(_)) => {
                    return Err(BatchError::NotFound(batch_id.to_string()))
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(BatchError::Contention(batch_id.to_string()))
    }

    /// Persist the pause/resume snapshot for external inspection
    fn write_resume_record(&self, summary: &BatchSummary) {
        let record = ResumeRecord {
            batch_id: summary.batch_id.clone(),
            processed_files: summary.processed_files,
            completed_files: summary.completed_files,
            failed_files: summary.failed_files,
            resume_count: summary.resume_count,
            recorded_at: Utc::now().to_rfc3339(),
        };
        match serde_json::to_value(&record) {
            Ok(value) => {
                self.store.put(
                    &Self::resume_key(&summary.batch_id),
                    value,
                    self.config.record_ttl_seconds,
                );
            }
            Err(err) => warn!(
                "could not persist resume record for {}: {}",
                &summary.batch_id[..8],
                err
            ),
        }
    }

    /// Read the pause/resume snapshot, if one exists
    pub fn get_resume_record(&self, batch_id: &str) -> Option<ResumeRecord> {
        self.store
            .get(&Self::resume_key(batch_id))
            .and_then(|record| serde_json::from_value(record.value).ok())
    }
}
