/*!
 * End-to-end batch lifecycle tests driven through the public poll surface.
 */

use crate::common::{orchestrator_with, urls, working_orchestrator};
use transbatch::batch::{BatchStatus, CompletionOutcome, FileResult, ProcessOutcome};
use transbatch::connectors::mock::{MockJobProcessor, MockSetup};

/// Poll until the batch reports completion, with a safety bound
async fn poll_to_completion(
    orchestrator: &transbatch::batch::BatchOrchestrator,
    batch_id: &str,
) -> transbatch::batch::CompletionSummary {
    for _ in 0..100 {
        let outcome = orchestrator
            .process_next_file(batch_id)
            .await
            .expect("poll");

        // Counter invariant holds after every advance call
        let summary = orchestrator.get_batch_status(batch_id).expect("status");
        assert_eq!(
            summary.processed_files,
            summary.completed_files + summary.failed_files
        );
        assert!(summary.processed_files <= summary.valid_files);

        if let ProcessOutcome::Completed(completion) = outcome {
            return completion;
        }
    }
    panic!("batch did not complete within poll bound");
}

#[tokio::test]
async fn test_batchWorkflow_happyPath_shouldTranslateEveryFile() {
    let (orchestrator, _store) = working_orchestrator();

    let created = orchestrator
        .create_batch(
            &urls(&[
                "https://docs.example.com/a.pdf",
                "https://docs.example.com/b.xlsx",
                "https://docs.example.com/c.pptx",
            ]),
            "ja",
            "tech",
            "quarterly docs",
        )
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");

    let completion = poll_to_completion(&orchestrator, &created.batch_id).await;

    assert_eq!(completion.completed_files, 3);
    assert_eq!(completion.failed_files, 0);
    assert_eq!(
        completion.completed_file_list.len(),
        completion.completed_files
    );
    for file in &completion.completed_file_list {
        assert!(file.target_file_url.is_some());
    }

    let summary = orchestrator
        .get_batch_status(&created.batch_id)
        .expect("status");
    assert_eq!(summary.status, BatchStatus::Completed);
}

#[tokio::test]
async fn test_batchWorkflow_mixedUrls_shouldOnlyProcessValidFiles() {
    let (orchestrator, _store) = working_orchestrator();

    let created = orchestrator
        .create_batch(
            &urls(&[
                "https://docs.example.com/a.pdf",
                "bad",
                "https://docs.example.com/b.pdf",
            ]),
            "en",
            "tech",
            "mixed",
        )
        .await
        .expect("create");
    assert_eq!(created.valid_files, 2);
    assert_eq!(created.invalid_files, 1);

    orchestrator.start_batch(&created.batch_id).expect("start");
    let completion = poll_to_completion(&orchestrator, &created.batch_id).await;

    assert_eq!(completion.completed_files, 2);
    assert_eq!(completion.completed_file_list.len(), 2);
}

#[tokio::test]
async fn test_batchWorkflow_transientSetupFailure_shouldRecoverThroughRetry() {
    // The first two setup calls fail with a transient network error
    let (orchestrator, _store) = orchestrator_with(
        MockSetup::fail_first(2),
        MockJobProcessor::completing_after(1),
    );

    let created = orchestrator
        .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", "t")
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");

    let completion = poll_to_completion(&orchestrator, &created.batch_id).await;
    assert_eq!(completion.completed_files, 1);
    assert_eq!(completion.failed_files, 0);

    // The retries were recorded on the file task before it succeeded
    let summary = orchestrator
        .get_batch_status(&created.batch_id)
        .expect("status");
    assert_eq!(summary.completed_files, 1);
}

#[tokio::test]
async fn test_batchWorkflow_failingFile_shouldNotAbortBatch() {
    // Setup succeeds but every job advance reports an upstream API error;
    // each file eventually fails while the batch itself completes
    let (orchestrator, _store) =
        orchestrator_with(MockSetup::working(), MockJobProcessor::erroring());

    let created = orchestrator
        .create_batch(
            &urls(&[
                "https://docs.example.com/a.pdf",
                "https://docs.example.com/b.pdf",
            ]),
            "en",
            "tech",
            "doomed",
        )
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");

    let completion = poll_to_completion(&orchestrator, &created.batch_id).await;
    assert_eq!(completion.completed_files, 0);
    assert_eq!(completion.failed_files, 2);
    assert!(completion.completed_file_list.is_empty());
}

#[tokio::test]
async fn test_batchWorkflow_multiCycleJobs_shouldReportProgress() {
    let (orchestrator, _store) = orchestrator_with(
        MockSetup::working(),
        MockJobProcessor::completing_after(3),
    );

    let created = orchestrator
        .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", "t")
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");

    // First poll sets up the translation task
    let outcome = orchestrator
        .process_next_file(&created.batch_id)
        .await
        .expect("setup poll");
    let task_id = match outcome {
        ProcessOutcome::Processing { task_id, .. } => task_id,
        other => panic!("expected processing, got {:?}", other),
    };

    // Two advance cycles stay in flight, the third completes the file
    for expected in 1..=2u32 {
        match orchestrator
            .process_next_file(&created.batch_id)
            .await
            .expect("advance poll")
        {
            ProcessOutcome::Processing {
                completed_jobs,
                total_jobs,
                task_id: polled_task,
                ..
            } => {
                assert_eq!(polled_task, task_id);
                assert_eq!(completed_jobs, expected);
                assert_eq!(total_jobs, 3);
            }
            other => panic!("expected in-flight progress, got {:?}", other),
        }
    }

    match orchestrator
        .process_next_file(&created.batch_id)
        .await
        .expect("final advance")
    {
        ProcessOutcome::Completed(completion) => {
            assert_eq!(completion.completed_files, 1);
        }
        other => panic!("expected completion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_onFileCompleted_externalReport_shouldFinishBatch() {
    let (orchestrator, _store) = orchestrator_with(
        MockSetup::working(),
        MockJobProcessor::completing_after(10),
    );

    let created = orchestrator
        .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", "t")
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");

    let outcome = orchestrator
        .process_next_file(&created.batch_id)
        .await
        .expect("setup poll");
    let task_id = match outcome {
        ProcessOutcome::Processing { task_id, .. } => task_id,
        other => panic!("expected processing, got {:?}", other),
    };

    // The job driver reports completion out of band
    let outcome = orchestrator
        .on_file_completed(
            &created.batch_id,
            &task_id,
            &FileResult::ok("https://docs.example.com/a.pdf?translated"),
        )
        .expect("record completion");

    match outcome {
        CompletionOutcome::Completed(completion) => {
            assert_eq!(completion.completed_files, 1);
            assert_eq!(
                completion.completed_file_list[0].target_file_url.as_deref(),
                Some("https://docs.example.com/a.pdf?translated")
            );
        }
        other => panic!("expected batch completion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_onFileCompleted_unknownCorrelation_shouldError() {
    let (orchestrator, _store) = working_orchestrator();
    let created = orchestrator
        .create_batch(&urls(&["https://docs.example.com/a.pdf"]), "en", "tech", "t")
        .await
        .expect("create");
    orchestrator.start_batch(&created.batch_id).expect("start");

    assert!(orchestrator
        .on_file_completed(&created.batch_id, "task-unknown", &FileResult::ok("url"))
        .is_err());
}

#[tokio::test]
async fn test_pauseMidBatch_shouldStopAdvancementUntilResume() {
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

    orchestrator
        .process_next_file(&created.batch_id)
        .await
        .expect("first poll");
    orchestrator.pause_batch(&created.batch_id).expect("pause");

    let outcome = orchestrator
        .process_next_file(&created.batch_id)
        .await
        .expect("poll while paused");
    assert!(matches!(
        outcome,
        ProcessOutcome::NotProcessing {
            batch_status: BatchStatus::Paused
        }
    ));

    orchestrator.resume_batch(&created.batch_id).expect("resume");
    let completion = poll_to_completion(&orchestrator, &created.batch_id).await;
    assert_eq!(completion.completed_files, 2);
}
