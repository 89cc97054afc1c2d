mod support;

use ledger_core::{JobStatus, LocalJobRecord, ParseMode, StatusReport};
use ledger_engine::{
    reconcile_job_cache, ApiError, FailureKind, JobCacheStore, MemoryJobCacheStore,
    ReconcileOutcome,
};
use pretty_assertions::assert_eq;
use support::{init_logging, report, FakeBackend};

fn cached(job_id: &str) -> LocalJobRecord {
    LocalJobRecord {
        status: JobStatus::Processing,
        step: "ocr_pages".to_string(),
        progress: 20,
        ..LocalJobRecord::new(job_id, format!("{job_id}.pdf"), 1_000)
    }
}

#[tokio::test]
async fn reconcile_merges_drops_and_tolerates_errors() {
    init_logging();
    let backend = FakeBackend::new();
    backend.script_status(
        "J1",
        vec![Ok(StatusReport {
            parse_mode: Some(ParseMode::Text),
            ..report(JobStatus::Completed, "done", 100)
        })],
    );
    // J2 unknown to the server: 404.
    backend.script_status(
        "J3",
        vec![Err(ApiError::new(FailureKind::Timeout, "timed out"))],
    );
    let store = MemoryJobCacheStore::new(vec![cached("J1"), cached("J2"), cached("J3")]);

    let outcome = reconcile_job_cache(&backend, &store).await;

    let expected = vec![
        LocalJobRecord {
            status: JobStatus::Completed,
            step: "done".to_string(),
            progress: 100,
            parse_mode: ParseMode::Text,
            ..cached("J1")
        },
        cached("J3"),
    ];
    assert_eq!(outcome, ReconcileOutcome::Updated(expected.clone()));
    assert_eq!(store.snapshot(), expected);
    assert_eq!(backend.calls(), vec!["status J1", "status J2", "status J3"]);
}

#[tokio::test]
async fn unauthorized_aborts_without_touching_the_cache() {
    init_logging();
    let backend = FakeBackend::new();
    backend.script_status("J1", vec![Ok(report(JobStatus::Completed, "done", 100))]);
    backend.script_status(
        "J2",
        vec![Err(ApiError::new(FailureKind::Unauthorized, "not_authenticated"))],
    );
    let original = vec![cached("J1"), cached("J2"), cached("J3")];
    let store = MemoryJobCacheStore::new(original.clone());

    let outcome = reconcile_job_cache(&backend, &store).await;

    assert_eq!(outcome, ReconcileOutcome::Unauthorized);
    assert_eq!(store.load(), original);
    assert_eq!(backend.count("status J3"), 0);
}

#[tokio::test]
async fn empty_cache_makes_no_requests() {
    init_logging();
    let backend = FakeBackend::new();
    let store = MemoryJobCacheStore::default();

    let outcome = reconcile_job_cache(&backend, &store).await;

    assert_eq!(outcome, ReconcileOutcome::Updated(Vec::new()));
    assert!(backend.calls().is_empty());
}
