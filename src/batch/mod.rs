/*!
 * Batch orchestration: records, state machine and the operation surface.
 *
 * This module is split into:
 * - `models`: persisted records (`BatchRecord`, `FileTask`), status enums and
 *   the outcome DTOs of every operation
 * - `orchestrator`: the `BatchOrchestrator` driving the lifecycle over the
 *   TTL state store
 */

// Re-export main types for easier usage
pub use self::models::{
    BatchCreated, BatchRecord, BatchStatus, BatchSummary, CancelOutcome, CompletedFile,
    CompletionOutcome, CompletionSummary, FileResult, FileTask, FileTaskStatus, HealthIssue,
    HealthReport, HealthStatus, InvalidFile, ProcessOutcome, RecoveryAction, RecoveryReport,
    ResumeRecord, RetryRejection, RetryReport, StartOutcome,
};
pub use self::orchestrator::BatchOrchestrator;

// Submodules
pub mod models;
pub mod orchestrator;
