/*!
 * Priority task queue with admission control.
 *
 * Tasks are held in a deterministically ordered queue (higher priority first,
 * FIFO among equals) and admitted up to a fixed concurrency limit. There is
 * no thread pool: `dequeue` hands a task to the caller, who performs the work
 * and reports back through `complete` or `fail`. Failed tasks are requeued at
 * a demoted priority until the retry budget runs out.
 */

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::errors::{QueueError, StoreError};
use crate::store::StateStore;

/// Store key for queue persistence
const QUEUE_KEY: &str = "task_queue";

/// Lowest admissible priority
pub const MIN_PRIORITY: u8 = 1;
/// Highest admissible priority
pub const MAX_PRIORITY: u8 = 10;

/// Queue task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueTaskStatus {
    /// Waiting in the ordered queue
    Queued,
    /// Admitted and handed to a caller
    Processing,
    /// Finished successfully
    Completed,
    /// Failed permanently
    Failed,
}

impl fmt::Display for QueueTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueTaskStatus::Queued => write!(f, "queued"),
            QueueTaskStatus::Processing => write!(f, "processing"),
            QueueTaskStatus::Completed => write!(f, "completed"),
            QueueTaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One unit of admitted, priority-ordered work.
///
/// Owned exclusively by the queue; callers receive clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueTask {
    /// Unique task identifier (UUID)
    pub task_id: String,
    /// Caller-defined task type, used for statistics
    pub task_type: String,
    /// Current priority (1-10, demoted on retry)
    pub priority: u8,
    /// Current status
    pub status: QueueTaskStatus,
    /// Opaque caller payload
    pub payload: Value,
    /// Retries consumed so far
    pub retry_count: u32,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// Admission timestamp
    pub started_at: Option<String>,
    /// Completion timestamp
    pub completed_at: Option<String>,
    /// Permanent failure timestamp
    pub failed_at: Option<String>,
    /// Processing duration in milliseconds, recorded on completion
    pub duration_ms: Option<i64>,
    /// Result reported by the caller
    pub result: Option<Value>,
    /// Last error message
    pub error_message: Option<String>,
}

impl QueueTask {
    fn new(task_type: &str, payload: Value, priority: u8) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            task_type: task_type.to_string(),
            priority,
            status: QueueTaskStatus::Queued,
            payload,
            retry_count: 0,
            created_at: Utc::now().to_rfc3339(),
            started_at: None,
            completed_at: None,
            failed_at: None,
            duration_ms: None,
            result: None,
            error_message: None,
        }
    }
}

/// Aggregate queue statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks waiting for admission
    pub queued: usize,
    /// Tasks currently admitted
    pub active: usize,
    /// Tasks finished successfully
    pub completed: usize,
    /// Tasks failed permanently
    pub failed: usize,
    /// Average wait (creation to admission) over completed tasks, ms
    pub avg_wait_ms: f64,
    /// Average processing (admission to completion) over completed tasks, ms
    pub avg_processing_ms: f64,
    /// completed / (completed + failed), 0.0 when nothing finished
    pub success_rate: f64,
    /// Task counts per priority, across all states
    pub by_priority: HashMap<u8, usize>,
    /// Task counts per type, across all states
    pub by_type: HashMap<String, usize>,
}

/// Priority-ordered, admission-controlled task store
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskQueue {
    queued: Vec<QueueTask>,
    active: HashMap<String, QueueTask>,
    completed: Vec<QueueTask>,
    failed: Vec<QueueTask>,
    concurrency_limit: usize,
    max_retry_attempts: u32,
}

impl TaskQueue {
    /// Create an empty queue with the given admission ceiling and retry budget
    pub fn new(concurrency_limit: usize, max_retry_attempts: u32) -> Self {
        Self {
            queued: Vec::new(),
            active: HashMap::new(),
            completed: Vec::new(),
            failed: Vec::new(),
            concurrency_limit,
            max_retry_attempts,
        }
    }

    /// Add a task, returning its id.
    ///
    /// Priority is clamped into `[1, 10]`. The task is inserted immediately
    /// before the first queued task with strictly lower priority, so equal
    /// priorities keep FIFO order.
    pub fn enqueue(&mut self, task_type: &str, payload: Value, priority: u8) -> String {
        let priority = priority.clamp(MIN_PRIORITY, MAX_PRIORITY);
        let task = QueueTask::new(task_type, payload, priority);
        let task_id = task.task_id.clone();

        debug!("enqueue '{}' ({}) at priority {}", task_id, task_type, priority);
        self.insert_ordered(task);
        task_id
    }

    /// Take the next task if the queue is non-empty and a concurrency slot is
    /// free; `None` otherwise. Callers poll rather than block.
    pub fn dequeue(&mut self) -> Option<QueueTask> {
        if self.queued.is_empty() || self.active.len() >= self.concurrency_limit {
            return None;
        }

        let mut task = self.queued.remove(0);
        task.status = QueueTaskStatus::Processing;
        task.started_at = Some(Utc::now().to_rfc3339());

        self.active.insert(task.task_id.clone(), task.clone());
        Some(task)
    }

    /// Report successful completion of an active task
    pub fn complete(&mut self, task_id: &str, result: Value) -> Result<(), QueueError> {
        let mut task = self
            .active
            .remove(task_id)
            .ok_or_else(|| QueueError::NotActive(task_id.to_string()))?;

        let now = Utc::now();
        task.status = QueueTaskStatus::Completed;
        task.completed_at = Some(now.to_rfc3339());
        task.duration_ms = task
            .started_at
            .as_deref()
            .and_then(parse_timestamp)
            .map(|started| (now - started).num_milliseconds());
        task.result = Some(result);

        self.completed.push(task);
        Ok(())
    }

    /// Report failure of an active task.
    ///
    /// When retryable and within budget, the task is demoted by one priority
    /// level (floor 1) and reinserted into the ordered queue; otherwise it is
    /// failed permanently.
    pub fn fail(
        &mut self,
        task_id: &str,
        error_message: &str,
        should_retry: bool,
    ) -> Result<(), QueueError> {
        let mut task = self
            .active
            .remove(task_id)
            .ok_or_else(|| QueueError::NotActive(task_id.to_string()))?;

        task.error_message = Some(error_message.to_string());

        if should_retry {
            task.retry_count += 1;
            if task.retry_count <= self.max_retry_attempts {
                task.priority = task.priority.saturating_sub(1).max(MIN_PRIORITY);
                task.status = QueueTaskStatus::Queued;
                task.started_at = None;
                debug!(
                    "requeue '{}' (retry {}/{}) at priority {}",
                    task_id, task.retry_count, self.max_retry_attempts, task.priority
                );
                self.insert_ordered(task);
                return Ok(());
            }
            warn!(
                "task '{}' exhausted {} retries: {}",
                task_id, self.max_retry_attempts, error_message
            );
        }

        task.status = QueueTaskStatus::Failed;
        task.failed_at = Some(Utc::now().to_rfc3339());
        self.failed.push(task);
        Ok(())
    }

    /// Number of currently admitted tasks
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of tasks waiting for admission
    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    /// Snapshot of queued task ids in admission order
    pub fn queued_order(&self) -> Vec<&str> {
        self.queued.iter().map(|t| t.task_id.as_str()).collect()
    }

    /// Aggregate statistics over every task the queue has seen
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            queued: self.queued.len(),
            active: self.active.len(),
            completed: self.completed.len(),
            failed: self.failed.len(),
            ..QueueStats::default()
        };

        let finished = self.completed.len() + self.failed.len();
        if finished > 0 {
            stats.success_rate = self.completed.len() as f64 / finished as f64;
        }

        let mut wait_total = 0i64;
        let mut wait_count = 0usize;
        let mut processing_total = 0i64;
        let mut processing_count = 0usize;

        for task in &self.completed {
            let created = parse_timestamp(&task.created_at);
            let started = task.started_at.as_deref().and_then(parse_timestamp);
            if let (Some(created), Some(started)) = (created, started) {
                wait_total += (started - created).num_milliseconds();
                wait_count += 1;
            }
            if let Some(duration) = task.duration_ms {
                processing_total += duration;
                processing_count += 1;
            }
        }

        if wait_count > 0 {
            stats.avg_wait_ms = wait_total as f64 / wait_count as f64;
        }
        if processing_count > 0 {
            stats.avg_processing_ms = processing_total as f64 / processing_count as f64;
        }

        for task in self.all_tasks() {
            *stats.by_priority.entry(task.priority).or_insert(0) += 1;
            *stats.by_type.entry(task.task_type.clone()).or_insert(0) += 1;
        }

        stats
    }

    /// Persist the whole queue under the internal queue key
    pub fn persist_to(&self, store: &dyn StateStore, ttl_seconds: u64) -> Result<(), StoreError> {
        let value = serde_json::to_value(self)?;
        store.put(QUEUE_KEY, value, ttl_seconds);
        Ok(())
    }

    /// Restore a queue previously persisted with `persist_to`
    pub fn load_from(store: &dyn StateStore) -> Result<Option<TaskQueue>, StoreError> {
        match store.get(QUEUE_KEY) {
            Some(record) => Ok(Some(serde_json::from_value(record.value)?)),
            None => Ok(None),
        }
    }

    fn insert_ordered(&mut self, task: QueueTask) {
        let position = self
            .queued
            .iter()
            .position(|t| t.priority < task.priority)
            .unwrap_or(self.queued.len());
        self.queued.insert(position, task);
    }

    fn all_tasks(&self) -> impl Iterator<Item = &QueueTask> {
        self.queued
            .iter()
            .chain(self.active.values())
            .chain(self.completed.iter())
            .chain(self.failed.iter())
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
