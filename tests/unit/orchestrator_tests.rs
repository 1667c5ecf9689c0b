/*!
 * Orchestrator operation tests: creation, lifecycle toggles and the retry
 * classification policy.
 */

use crate::common::{orchestrator_with, urls, working_orchestrator};
use transbatch::batch::{BatchStatus, CancelOutcome, ProcessOutcome, StartOutcome};
use transbatch::connectors::mock::{MockJobProcessor, MockSetup};
use transbatch::errors::BatchError;

#[tokio::test]
async fn test_createBatch_mixedUrls_shouldPartitionValidAndInvalid() {
    let (orchestrator, _store) = working_orchestrator();

    let created = orchestrator
        .create_batch(
            &urls(&[
                "https://docs.example.com/a.pdf",
                "bad",
                "https://docs.example.com/b.xlsx",
            ]),
            "en",
            "tech",
            "mixed",
        )
        .await
        .expect("create batch");

    assert_eq!(created.total_files, 3);
    assert_eq!(created.valid_files, 2);
    assert_eq!(created.invalid_files, 1);
    assert_eq!(created.errors.len(), 1);
    assert_eq!(created.errors[0].url, "bad");

    // Creation does not start processing
    let summary = orchestrator
        .get_batch_status(&created.batch_id)
        .expect("status");
    assert_eq!(summary.status, BatchStatus::Pending);
}

#[tokio::test]
async fn test_startBatch_shouldBeIdempotentWhenProcessing() {
    let (orchestrator, _store) = working_orchestrator();
    let created = orchestrator
        .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", "t")
        .await
        .expect("create");

    assert_eq!(
        orchestrator.start_batch(&created.batch_id).expect("start"),
        StartOutcome::Started
    );
    assert_eq!(
        orchestrator.start_batch(&created.batch_id).expect("restart"),
        StartOutcome::AlreadyRunning
    );
}

#[tokio::test]
async fn test_startBatch_unknownId_shouldReturnNotFound() {
    let (orchestrator, _store) = working_orchestrator();
    assert!(matches!(
        orchestrator.start_batch("missing"),
        Err(BatchError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_pauseResume_shouldIncrementResumeCounterByOne() {
    let (orchestrator, _store) = working_orchestrator();
    let created = orchestrator
        .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", "t")
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");

    let paused = orchestrator.pause_batch(&created.batch_id).expect("pause");
    assert_eq!(paused.status, BatchStatus::Paused);
    let snapshot = orchestrator
        .get_resume_record(&created.batch_id)
        .expect("resume record after pause");
    assert_eq!(snapshot.resume_count, 0);

    let resumed = orchestrator.resume_batch(&created.batch_id).expect("resume");
    assert_eq!(resumed.status, BatchStatus::Processing);
    let snapshot = orchestrator
        .get_resume_record(&created.batch_id)
        .expect("resume record after resume");
    assert_eq!(snapshot.resume_count, 1);
}

#[tokio::test]
async fn test_pauseBatch_whenPending_shouldBeInvalidState() {
    let (orchestrator, _store) = working_orchestrator();
    let created = orchestrator
        .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", "t")
        .await
        .expect("create");

    assert!(matches!(
        orchestrator.pause_batch(&created.batch_id),
        Err(BatchError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_cancelBatch_shouldCancelNonTerminalFilesAndBeIdempotent() {
    let (orchestrator, _store) = working_orchestrator();
    let created = orchestrator
        .create_batch(
            &urls(&[
                "https://docs.example.com/a.pdf",
                "https://docs.example.com/b.pdf",
            ]),
            "en",
            "tech",
            "t",
        )
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");

    let outcome = orchestrator
        .cancel_batch(&created.batch_id, "operator request")
        .expect("cancel");
    assert!(matches!(
        outcome,
        CancelOutcome::Cancelled { cancelled_files: 2 }
    ));

    let repeat = orchestrator
        .cancel_batch(&created.batch_id, "again")
        .expect("cancel twice");
    assert!(matches!(repeat, CancelOutcome::AlreadyCancelled));

    // A cancelled batch is no longer advanced
    let outcome = orchestrator
        .process_next_file(&created.batch_id)
        .await
        .expect("poll");
    assert!(matches!(
        outcome,
        ProcessOutcome::NotProcessing {
            batch_status: BatchStatus::Cancelled
        }
    ));
}

#[tokio::test]
async fn test_listBatches_shouldReturnEveryLiveBatch() {
    let (orchestrator, _store) = working_orchestrator();
    for name in ["first", "second"] {
        orchestrator
            .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", name)
            .await
            .expect("create");
    }

    let mut names: Vec<String> = orchestrator
        .list_batches()
        .into_iter()
        .map(|summary| summary.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["first", "second"]);
}

#[tokio::test]
async fn test_retryPolicy_notFoundError_shouldNeverRetry() {
    let (orchestrator, _store) = orchestrator_with(
        MockSetup::failing_with_message("ファイルが見つかりません"),
        MockJobProcessor::completing_after(1),
    );
    let created = orchestrator
        .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", "t")
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");

    let outcome = orchestrator
        .process_next_file(&created.batch_id)
        .await
        .expect("poll");
    assert!(matches!(
        outcome,
        ProcessOutcome::FileFailed { file_index: 0, .. }
    ));

    let summary = orchestrator
        .get_batch_status(&created.batch_id)
        .expect("status");
    assert_eq!(summary.failed_files, 1);
    assert_eq!(summary.processed_files, 1);
}

#[tokio::test]
async fn test_retryPolicy_timeoutError_shouldRetryUntilMaxThenFail() {
    let (orchestrator, _store) = orchestrator_with(
        MockSetup::failing_with_message("処理がタイムアウトしました"),
        MockJobProcessor::completing_after(1),
    );
    let created = orchestrator
        .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", "t")
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");

    // Default budget is 3 retries: three recoverable failures, then terminal
    for expected_retry in 1..=3u32 {
        let outcome = orchestrator
            .process_next_file(&created.batch_id)
            .await
            .expect("poll");
        match outcome {
            ProcessOutcome::FileRetrying { retry_count, .. } => {
                assert_eq!(retry_count, expected_retry);
            }
            other => panic!("expected retry, got {:?}", other),
        }

        let summary = orchestrator
            .get_batch_status(&created.batch_id)
            .expect("status");
        assert_eq!(
            summary.processed_files,
            summary.completed_files + summary.failed_files
        );
    }

    let outcome = orchestrator
        .process_next_file(&created.batch_id)
        .await
        .expect("final poll");
    assert!(matches!(outcome, ProcessOutcome::FileFailed { .. }));
}

#[tokio::test]
async fn test_retryPolicy_unclassifiedError_shouldRetryExactlyOnce() {
    let (orchestrator, _store) = orchestrator_with(
        MockSetup::failing_with_message("something inexplicable"),
        MockJobProcessor::completing_after(1),
    );
    let created = orchestrator
        .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", "t")
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");

    let first = orchestrator
        .process_next_file(&created.batch_id)
        .await
        .expect("poll");
    assert!(matches!(first, ProcessOutcome::FileRetrying { .. }));

    let second = orchestrator
        .process_next_file(&created.batch_id)
        .await
        .expect("poll");
    assert!(matches!(second, ProcessOutcome::FileFailed { .. }));
}

#[tokio::test]
async fn test_retryFailedFiles_shouldRequeueEligibleAndReportRest() {
    let (orchestrator, _store) = orchestrator_with(
        MockSetup::failing_with_message("ファイルが見つかりません"),
        MockJobProcessor::completing_after(1),
    );
    let created = orchestrator
        .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", "t")
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");
    orchestrator
        .process_next_file(&created.batch_id)
        .await
        .expect("poll to terminal failure");

    let report = orchestrator
        .retry_failed_files(&created.batch_id, &[0, 5])
        .expect("retry");

    // Validation failure consumed no retries, so index 0 is requeued;
    // index 5 does not exist
    assert_eq!(report.requeued, vec![0]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].index, 5);

    let summary = orchestrator
        .get_batch_status(&created.batch_id)
        .expect("status");
    assert_eq!(summary.failed_files, 0);
    assert_eq!(summary.retrying_files, 1);
}
