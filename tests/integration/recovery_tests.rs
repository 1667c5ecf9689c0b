/*!
 * Health check and auto-recovery tests.
 *
 * Degraded batch states (stale timestamps, accumulated failures) are
 * manufactured by editing the stored record directly, since they cannot be
 * produced quickly through the public API.
 */

use serde_json::json;

use crate::common::{minutes_ago, urls, with_stored_batch, working_orchestrator};
use transbatch::batch::{HealthStatus, RecoveryAction};

async fn nine_file_batch(
    orchestrator: &transbatch::batch::BatchOrchestrator,
) -> String {
    let list: Vec<String> = (0..9)
        .map(|i| format!("https://docs.example.com/doc{}.pdf", i))
        .collect();
    let created = orchestrator
        .create_batch(&list, "en", "tech", "health probe")
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");
    created.batch_id
}

#[tokio::test]
async fn test_healthCheck_freshBatch_shouldBeHealthy() {
    let (orchestrator, _store) = working_orchestrator();
    let created = orchestrator
        .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", "t")
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");

    let report = orchestrator.health_check(&created.batch_id).expect("check");
    assert_eq!(report.status, HealthStatus::Healthy);
    assert!(report.issues.is_empty());
}

#[tokio::test]
async fn test_healthCheck_staleBatch_shouldWarn() {
    let (orchestrator, store) = working_orchestrator();
    let batch_id = nine_file_batch(&orchestrator).await;

    with_stored_batch(&store, &batch_id, |value| {
        value["last_updated"] = json!(minutes_ago(45));
    });

    let report = orchestrator.health_check(&batch_id).expect("check");
    assert_eq!(report.status, HealthStatus::Warning);
    assert_eq!(report.issues.len(), 1);
}

#[tokio::test]
async fn test_healthCheck_allThreeIssues_shouldBeUnhealthy() {
    let (orchestrator, store) = working_orchestrator();
    let batch_id = nine_file_batch(&orchestrator).await;

    with_stored_batch(&store, &batch_id, |value| {
        value["last_updated"] = json!(minutes_ago(45));
        // Four terminal failures: error rate 4/4 over the >3 floor
        for i in 0..4 {
            value["files"][i]["status"] = json!("failed");
            value["files"][i]["error_kind"] = json!("transient");
        }
        // Four waiting retries: one past the storm threshold
        for i in 4..8 {
            value["files"][i]["status"] = json!("retrying");
            value["files"][i]["retry_count"] = json!(1);
        }
    });

    let report = orchestrator.health_check(&batch_id).expect("check");
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert_eq!(report.issues.len(), 3);
}

#[tokio::test]
async fn test_healthCheck_fewProcessedFiles_shouldNotFlagErrorRate() {
    let (orchestrator, store) = working_orchestrator();
    let batch_id = nine_file_batch(&orchestrator).await;

    // Two failures is all-failed but below the processed>3 floor
    with_stored_batch(&store, &batch_id, |value| {
        for i in 0..2 {
            value["files"][i]["status"] = json!("failed");
        }
    });

    let report = orchestrator.health_check(&batch_id).expect("check");
    assert_eq!(report.status, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_autoRecovery_staleInFlightFile_shouldRequeueWithTimeout() {
    let (orchestrator, store) = working_orchestrator();
    let batch_id = nine_file_batch(&orchestrator).await;

    with_stored_batch(&store, &batch_id, |value| {
        value["last_updated"] = json!(minutes_ago(45));
        value["files"][0]["status"] = json!("processing");
        value["files"][0]["task_id"] = json!("task-stuck");
        value["files"][0]["started_at"] = json!(minutes_ago(45));
    });

    let report = orchestrator
        .attempt_auto_recovery(&batch_id)
        .expect("recover");
    assert!(matches!(
        report.actions[0],
        RecoveryAction::RequeuedStalled { file_index: 0 }
    ));

    let summary = orchestrator.get_batch_status(&batch_id).expect("status");
    assert_eq!(summary.retrying_files, 1);
}

#[tokio::test]
async fn test_autoRecovery_failedFiles_shouldRespectKindAndCap() {
    let (orchestrator, store) = working_orchestrator();
    let batch_id = nine_file_batch(&orchestrator).await;

    with_stored_batch(&store, &batch_id, |value| {
        // Index 1: permission-class failure, never requeued
        value["files"][1]["status"] = json!("failed");
        value["files"][1]["error_kind"] = json!("validation");
        // Indices 2-5: transient failures with retries left
        for i in 2..6 {
            value["files"][i]["status"] = json!("failed");
            value["files"][i]["error_kind"] = json!("transient");
            value["files"][i]["retry_count"] = json!(1);
        }
    });

    let report = orchestrator
        .attempt_auto_recovery(&batch_id)
        .expect("recover");

    // At most three failed files per call, skipping the validation failure
    let requeued: Vec<usize> = report
        .actions
        .iter()
        .map(|action| match action {
            RecoveryAction::RequeuedFailed { file_index } => *file_index,
            RecoveryAction::RequeuedStalled { file_index } => *file_index,
        })
        .collect();
    assert_eq!(requeued, vec![2, 3, 4]);

    let summary = orchestrator.get_batch_status(&batch_id).expect("status");
    assert_eq!(summary.failed_files, 2);
    assert_eq!(summary.retrying_files, 3);
}

#[tokio::test]
async fn test_autoRecovery_exhaustedRetries_shouldNotRequeue() {
    let (orchestrator, store) = working_orchestrator();
    let batch_id = nine_file_batch(&orchestrator).await;

    with_stored_batch(&store, &batch_id, |value| {
        value["files"][0]["status"] = json!("failed");
        value["files"][0]["error_kind"] = json!("transient");
        value["files"][0]["retry_count"] = json!(3);
    });

    let report = orchestrator
        .attempt_auto_recovery(&batch_id)
        .expect("recover");
    assert!(report.no_recovery_possible());
}

#[tokio::test]
async fn test_autoRecovery_nothingWrong_shouldReportNoRecoveryPossible() {
    let (orchestrator, _store) = working_orchestrator();
    let created = orchestrator
        .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", "t")
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");

    let report = orchestrator
        .attempt_auto_recovery(&created.batch_id)
        .expect("recover");
    assert!(report.no_recovery_possible());
    assert!(report.actions.is_empty());
}
