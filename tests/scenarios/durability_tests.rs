use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use ragflow_core::{ManualClock, PollError, RetryPolicy, RunStatus, RunTracker, WorkflowRuntime};
use ragflow_kb::test_utils::{CountingVectorStore, FlakyEmbedder, HashingEmbedder, StaticChunker};
use ragflow_kb::{EmbeddingGenerator, IngestionWorkflow, EXPIRED_STATUS, INGEST_EVENT};
use ragflow_state_sqlite::{SqliteConfig, SqliteStateStore};
use ragflow_tests::DIMENSION;

fn ingest_payload(key: &str) -> serde_json::Value {
    json!({"documentPath": "contract.pdf", "isolationKey": key})
}

fn ingestion_runtime(
    runtime: WorkflowRuntime,
    embedder: Arc<dyn EmbeddingGenerator>,
    store: &CountingVectorStore,
) -> WorkflowRuntime {
    runtime.register(
        INGEST_EVENT,
        Arc::new(IngestionWorkflow::new(
            Arc::new(StaticChunker::new(["clause one", "clause two"])),
            embedder,
            Arc::new(store.clone()),
        )),
    );
    runtime
}

#[tokio::test]
async fn transient_embedding_failures_are_retried() {
    let store = CountingVectorStore::new(DIMENSION);
    let embedder = Arc::new(FlakyEmbedder::new(DIMENSION, 2));
    let runtime = ingestion_runtime(
        WorkflowRuntime::in_memory(Arc::new(ManualClock::starting_now()))
            .with_retry_policy(RetryPolicy::immediate(3)),
        embedder.clone(),
        &store,
    );

    let trigger = runtime.submit(INGEST_EVENT, ingest_payload("s1--contract.pdf")).await.unwrap();
    runtime.settle().await;

    let runs = runtime.runs_for_trigger(&trigger).await.unwrap();
    assert_eq!(runs[0].status, RunStatus::Running);
    assert_eq!(embedder.attempts(), 3);
    assert_eq!(store.inner().count_for("s1--contract.pdf").await, 2);
}

#[tokio::test]
async fn exhausted_retries_fail_the_run_and_the_tracker_reports_it() {
    let store = CountingVectorStore::new(DIMENSION);
    let embedder = Arc::new(FlakyEmbedder::new(DIMENSION, 10));
    let runtime = ingestion_runtime(
        WorkflowRuntime::in_memory(Arc::new(ManualClock::starting_now()))
            .with_retry_policy(RetryPolicy::immediate(3)),
        embedder.clone(),
        &store,
    );
    let tracker = RunTracker::new(Arc::new(runtime.clone()));

    let err = tracker
        .submit_and_wait(
            INGEST_EVENT,
            ingest_payload("s1--contract.pdf"),
            Duration::from_secs(5),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();

    match err {
        PollError::RunFailed { status, detail } => {
            assert_eq!(status, RunStatus::Failed);
            assert!(detail.contains("embed_and_upsert"), "detail: {}", detail);
        }
        other => panic!("expected a failed run, got {:?}", other),
    }
    assert_eq!(embedder.attempts(), 3);
    assert_eq!(store.upsert_calls(), 0);
    assert!(store.inner().is_empty().await);
}

#[tokio::test]
async fn tracker_timeout_is_distinct_from_failure() {
    let store = CountingVectorStore::new(DIMENSION);
    let runtime = ingestion_runtime(
        WorkflowRuntime::in_memory(Arc::new(ManualClock::starting_now())),
        Arc::new(HashingEmbedder::new(DIMENSION)),
        &store,
    );
    let tracker = RunTracker::new(Arc::new(runtime.clone()));

    // The ingestion parks at its ten minute wait, which never elapses here
    let err = tracker
        .submit_and_wait(
            INGEST_EVENT,
            ingest_payload("s1--contract.pdf"),
            Duration::from_millis(150),
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PollError::Timeout {
            last_status: Some(RunStatus::Running)
        }
    );
    // The run itself is untouched by the caller giving up
    assert_eq!(store.inner().count_for("s1--contract.pdf").await, 2);
    assert!(store.deleted_keys().is_empty());
}

async fn open_state(dir: &TempDir) -> SqliteStateStore {
    SqliteStateStore::with_config(SqliteConfig {
        connection_string: format!("sqlite://{}", dir.path().join("ragflow.db").display()),
        ..Default::default()
    })
    .await
    .unwrap()
}

fn sqlite_runtime(
    state: &SqliteStateStore,
    clock: Arc<ManualClock>,
    embedder: Arc<HashingEmbedder>,
    store: &CountingVectorStore,
) -> WorkflowRuntime {
    let (instances, steps, timers) = state.create_repositories();
    ingestion_runtime(
        WorkflowRuntime::new(instances, steps, timers, clock),
        embedder,
        store,
    )
}

#[tokio::test]
async fn retention_wait_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::starting_now());
    let store = CountingVectorStore::new(DIMENSION);
    let embedder = Arc::new(HashingEmbedder::new(DIMENSION));

    let trigger = {
        let state = open_state(&dir).await;
        let runtime = sqlite_runtime(&state, clock.clone(), embedder.clone(), &store);
        let trigger = runtime
            .submit(INGEST_EVENT, ingest_payload("s7--contract.pdf"))
            .await
            .unwrap();
        runtime.settle().await;
        assert_eq!(
            runtime.runs_for_trigger(&trigger).await.unwrap()[0].status,
            RunStatus::Running
        );
        state.close().await;
        trigger
    };

    // Restarted process: same database, fresh runtime
    let state = open_state(&dir).await;
    let runtime = sqlite_runtime(&state, clock.clone(), embedder.clone(), &store);
    assert_eq!(runtime.recover().await.unwrap(), 1);
    runtime.settle().await;
    assert_eq!(store.inner().count_for("s7--contract.pdf").await, 2);

    clock.advance(Duration::from_secs(601));
    assert_eq!(runtime.process_due_timers().await.unwrap(), 1);
    runtime.settle().await;

    let runs = runtime.runs_for_trigger(&trigger).await.unwrap();
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(
        runs[0].output,
        Some(json!({"status": EXPIRED_STATUS, "ingestedCount": 2}))
    );
    // Embedding and upsert were replayed from the step log, not repeated
    assert_eq!(embedder.calls(), 1);
    assert_eq!(store.upsert_calls(), 1);
    assert_eq!(store.deleted_keys(), vec!["s7--contract.pdf".to_string()]);
    assert_eq!(store.inner().count_for("s7--contract.pdf").await, 0);
}
