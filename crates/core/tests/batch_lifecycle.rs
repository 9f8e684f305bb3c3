//! Batch matching integration tests.
//!
//! These tests verify selection, bounded fan-out, result ordering and the
//! single-run lock of the batch scheduler.

use std::sync::Arc;
use std::time::Duration;

use reelmatch_core::{
    testing::{fixtures, MockEnricher, MockLibrary, MockSearcher},
    BatchConfig, BatchError, BatchRequest, BatchScheduler, MatchOrchestrator,
};

struct TestHarness {
    library: Arc<MockLibrary>,
    searcher: Arc<MockSearcher>,
    scheduler: Arc<BatchScheduler>,
}

impl TestHarness {
    async fn new() -> Self {
        let library = Arc::new(MockLibrary::new());
        let searcher = Arc::new(MockSearcher::new());
        searcher
            .set_fallback(vec![fixtures::candidate("some-scene", "Some Scene")])
            .await;
        let orchestrator = Arc::new(MatchOrchestrator::new(
            searcher.clone(),
            Arc::new(MockEnricher::new()),
            library.clone(),
            fixtures::matcher_config(),
        ));
        let scheduler = Arc::new(BatchScheduler::new(orchestrator, BatchConfig::default()));
        Self {
            library,
            searcher,
            scheduler,
        }
    }

    async fn wait_until_idle(&self) {
        for _ in 0..200 {
            if !self.scheduler.is_running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("batch did not finish in time");
    }
}

#[tokio::test]
async fn test_batch_matches_eligible_files_in_order() {
    let harness = TestHarness::new().await;
    let first = harness.library.add_file("Some_Scene_A.mp4");
    let second = harness.library.add_file("Some_Scene_B.mp4");
    harness.library.add_linked_file("Already.mp4", "custom-pmv-1");
    let third = harness.library.add_file("Some_Scene_C.mp4");

    let result = harness
        .scheduler
        .run_batch(BatchRequest::default())
        .await
        .unwrap();

    assert!(!result.run_id.is_empty());
    assert_eq!(result.scanned, 3);
    assert_eq!(result.matched, 3);
    assert_eq!(result.errors, 0);
    assert_eq!(result.skipped_already_matched, 0);

    // most recently discovered first
    let ids: Vec<u64> = result.results.iter().map(|i| i.file_id).collect();
    assert_eq!(ids, vec![third, second, first]);
    assert!(result.results.iter().all(|i| i.status_code == 200));
    assert_eq!(harness.library.applied_links().len(), 3);
}

#[tokio::test]
async fn test_batch_counts_errors_per_file() {
    let harness = TestHarness::new().await;
    harness.library.add_file("Some_Scene.mp4");
    let empty = harness.library.add_file("___.mp4");

    let result = harness
        .scheduler
        .run_batch(BatchRequest::default())
        .await
        .unwrap();

    assert_eq!(result.scanned, 2);
    assert_eq!(result.matched, 1);
    assert_eq!(result.errors, 1);

    let failed = result
        .results
        .iter()
        .find(|i| i.file_id == empty)
        .unwrap();
    assert_eq!(failed.status_code, 400);
    assert!(failed.error.is_some());
    assert!(failed.result.is_none());
}

#[tokio::test]
async fn test_batch_order_independent_of_completion_order() {
    let harness = TestHarness::new().await;
    let alpha = harness.library.add_file("Alpha.mp4");
    let bravo = harness.library.add_file("Bravo.mp4");
    let charlie = harness.library.add_file("Charlie.mp4");
    // newest is selected first and finishes last
    harness
        .searcher
        .set_delay_for("charlie", Duration::from_millis(150))
        .await;
    harness
        .searcher
        .set_delay_for("bravo", Duration::from_millis(75))
        .await;

    let result = harness
        .scheduler
        .run_batch(BatchRequest {
            concurrency: 3,
            ..BatchRequest::default()
        })
        .await
        .unwrap();

    let finished: Vec<u64> = harness
        .library
        .applied_links()
        .iter()
        .map(|l| l.file_id)
        .collect();
    assert_eq!(finished, vec![alpha, bravo, charlie]);

    let ids: Vec<u64> = result.results.iter().map(|i| i.file_id).collect();
    assert_eq!(ids, vec![charlie, bravo, alpha]);
    assert_eq!(result.matched, 3);
}

#[tokio::test]
async fn test_batch_counters_cover_every_outcome() {
    let harness = TestHarness::new().await;
    let unmatched = harness.library.add_file("Nothing.mp4");
    let invalid = harness.library.add_file("___.mp4");
    let raced = harness.library.add_file("Some_Scene_Raced.mp4");
    let linked = harness.library.add_file("Some_Scene.mp4");
    harness.searcher.set_results("nothing", Vec::new()).await;
    harness.library.link_on_read(raced, "custom-pmv-elsewhere");

    let result = harness
        .scheduler
        .run_batch(BatchRequest {
            concurrency: 2,
            ..BatchRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(result.scanned, 4);
    assert_eq!(result.matched, 1);
    assert_eq!(result.skipped_already_matched, 1);
    assert_eq!(result.errors, 1);

    let status = |id: u64| {
        result
            .results
            .iter()
            .find(|i| i.file_id == id)
            .map(|i| i.status_code)
            .unwrap()
    };
    assert_eq!(status(linked), 200);
    assert_eq!(status(raced), 409);
    assert_eq!(status(invalid), 400);
    assert_eq!(status(unmatched), 200);

    let not_linked = result
        .results
        .iter()
        .filter(|i| {
            i.status_code == 200 && i.result.as_ref().is_some_and(|r| !r.autolinked)
        })
        .count();
    assert_eq!(not_linked, 1);
    assert_eq!(
        result.matched + result.skipped_already_matched + result.errors + not_linked,
        result.scanned
    );
    assert_eq!(harness.library.applied_links().len(), 1);
}

#[tokio::test]
async fn test_batch_dry_run_links_nothing() {
    let harness = TestHarness::new().await;
    harness.library.add_file("Some_Scene_A.mp4");
    harness.library.add_file("Some_Scene_B.mp4");

    let result = harness
        .scheduler
        .run_batch(BatchRequest {
            dry_run: true,
            ..BatchRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(result.scanned, 2);
    assert_eq!(result.matched, 0);
    assert!(result
        .results
        .iter()
        .all(|i| i.result.as_ref().is_some_and(|r| r.matched_scene_id.is_some())));
    assert!(harness.library.applied_links().is_empty());
}

#[tokio::test]
async fn test_batch_respects_limit_and_filter() {
    let harness = TestHarness::new().await;
    for i in 0..5 {
        harness.library.add(&format!("Scene_{}.mp4", i), "video", Some(1), None);
    }
    harness.library.add("Other.mp4", "video", Some(2), None);

    let result = harness
        .scheduler
        .run_batch(BatchRequest {
            limit: 2,
            volume_id: Some(1),
            ..BatchRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(result.scanned, 2);

    let result = harness
        .scheduler
        .run_batch(BatchRequest {
            volume_id: Some(2),
            ..BatchRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(result.scanned, 1);
    assert_eq!(result.results[0].filename, "Other.mp4");
}

#[tokio::test]
async fn test_batch_bounds_concurrency() {
    let harness = TestHarness::new().await;
    for i in 0..6 {
        harness.library.add_file(&format!("Scene_{}.mp4", i));
    }
    harness.searcher.set_delay(Duration::from_millis(30)).await;

    let result = harness
        .scheduler
        .run_batch(BatchRequest {
            concurrency: 2,
            ..BatchRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(result.scanned, 6);
    assert!(harness.searcher.peak_in_flight() <= 2);
}

#[tokio::test]
async fn test_empty_batch() {
    let harness = TestHarness::new().await;

    let result = harness
        .scheduler
        .run_batch(BatchRequest::default())
        .await
        .unwrap();

    assert_eq!(result.scanned, 0);
    assert!(result.results.is_empty());
    assert!(!harness.scheduler.is_running());
}

#[tokio::test]
async fn test_second_batch_is_rejected_while_running() {
    let harness = TestHarness::new().await;
    harness.library.add_file("Some_Scene.mp4");
    harness.searcher.set_delay(Duration::from_millis(200)).await;

    let scheduler = harness.scheduler.clone();
    let running = tokio::spawn(async move { scheduler.run_batch(BatchRequest::default()).await });

    for _ in 0..100 {
        if harness.scheduler.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert!(harness.scheduler.is_running());

    let err = harness
        .scheduler
        .run_batch(BatchRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::AlreadyRunning(_)));
    assert_eq!(err.status_code(), 409);
    assert!(!harness.scheduler.trigger(BatchRequest::default()));

    let first = running.await.unwrap().unwrap();
    assert_eq!(first.matched, 1);
    assert!(!harness.scheduler.is_running());
}

#[tokio::test]
async fn test_trigger_runs_in_background() {
    let harness = TestHarness::new().await;
    harness.library.add_file("Some_Scene_A.mp4");
    harness.library.add_file("Some_Scene_B.mp4");

    assert!(harness.scheduler.trigger(BatchRequest::default()));
    harness.wait_until_idle().await;

    assert_eq!(harness.library.applied_links().len(), 2);
    assert!(harness.scheduler.trigger(BatchRequest::default()));
    harness.wait_until_idle().await;
}
