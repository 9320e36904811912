use pretty_assertions::assert_eq;
use ragflow_core::{ManualClock, RunStatus, TriggerId, WorkflowRuntime};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::test_utils::{
    CountingVectorStore, HashingEmbedder, MockAnswerGenerator, RecordingAnswerGenerator,
    StaticChunker,
};
use crate::traits::EmbeddingGenerator;
use crate::VectorStore;

const DIM: usize = 64;

struct Harness {
    runtime: WorkflowRuntime,
    clock: Arc<ManualClock>,
    chunker: Arc<StaticChunker>,
    embedder: Arc<HashingEmbedder>,
    store: CountingVectorStore,
    generator: Arc<RecordingAnswerGenerator>,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::starting_now());
    let runtime = WorkflowRuntime::in_memory(clock.clone());
    let chunker = Arc::new(StaticChunker::new([
        "The warranty covers parts for two years.",
        "Labour is covered for ninety days.",
    ]));
    let embedder = Arc::new(HashingEmbedder::new(DIM));
    let store = CountingVectorStore::new(DIM);
    let generator = Arc::new(RecordingAnswerGenerator::new("Two years."));

    runtime.register(
        INGEST_EVENT,
        Arc::new(IngestionWorkflow::new(
            chunker.clone(),
            embedder.clone(),
            Arc::new(store.clone()),
        )),
    );
    runtime.register(
        QUERY_EVENT,
        Arc::new(QueryWorkflow::new(
            embedder.clone(),
            Arc::new(store.clone()),
            generator.clone(),
        )),
    );

    Harness {
        runtime,
        clock,
        chunker,
        embedder,
        store,
        generator,
    }
}

async fn run_once(runtime: &WorkflowRuntime, event: &str, payload: Value) -> (TriggerId, RunStatus, Option<Value>) {
    let trigger = runtime.submit(event, payload).await.unwrap();
    runtime.settle().await;
    let runs = runtime.runs_for_trigger(&trigger).await.unwrap();
    assert_eq!(runs.len(), 1);
    (trigger, runs[0].status.clone(), runs[0].output.clone())
}

#[tokio::test]
async fn ingestion_is_searchable_until_retention_expires() {
    let h = harness();
    let payload = json!({"documentPath": "/tmp/does-not-exist.pdf", "isolationKey": "s1--warranty.pdf"});

    let (trigger, status, _) = run_once(&h.runtime, INGEST_EVENT, payload).await;
    assert_eq!(status, RunStatus::Running);
    assert_eq!(h.store.inner().count_for("s1--warranty.pdf").await, 2);

    let (_, status, output) = run_once(
        &h.runtime,
        QUERY_EVENT,
        json!({"question": "How long is the warranty?", "isolationKey": "s1--warranty.pdf"}),
    )
    .await;
    assert_eq!(status, RunStatus::Completed);
    assert_eq!(
        output,
        Some(json!({"answer": "Two years.", "sources": ["s1--warranty.pdf"], "numContexts": 2}))
    );

    h.clock.advance(Duration::from_secs(599));
    assert_eq!(h.runtime.process_due_timers().await.unwrap(), 0);

    h.clock.advance(Duration::from_secs(2));
    assert_eq!(h.runtime.process_due_timers().await.unwrap(), 1);
    h.runtime.settle().await;

    let runs = h.runtime.runs_for_trigger(&trigger).await.unwrap();
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(
        runs[0].output,
        Some(json!({"status": EXPIRED_STATUS, "ingestedCount": 2}))
    );
    assert_eq!(h.store.deleted_keys(), vec!["s1--warranty.pdf"]);
    assert!(h.store.inner().is_empty().await);

    // Chunking and embedding were not repeated on resume
    assert_eq!(h.chunker.reads().len(), 1);
    assert_eq!(h.store.upsert_calls(), 1);
}

#[tokio::test]
async fn malformed_ingestion_payload_completes_with_an_error_status() {
    let h = harness();

    let (_, status, output) =
        run_once(&h.runtime, INGEST_EVENT, json!({"documentPath": "/tmp/a.pdf"})).await;

    assert_eq!(status, RunStatus::Completed);
    let output = output.unwrap();
    assert_eq!(output["ingestedCount"], 0);
    assert!(output["status"].as_str().unwrap().starts_with("Error: "));
    assert!(h.chunker.reads().is_empty());
    assert_eq!(h.store.upsert_calls(), 0);
    assert!(h.store.deleted_keys().is_empty());
}

#[tokio::test]
async fn query_without_a_session_runs_no_steps() {
    let h = harness();

    for payload in [json!({"question": "anything?"}), json!({"question": "anything?", "isolationKey": ""})] {
        let (_, status, output) = run_once(&h.runtime, QUERY_EVENT, payload).await;
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(
            output,
            Some(json!({"answer": NO_SESSION_ANSWER, "sources": [], "numContexts": 0}))
        );
    }
    assert_eq!(h.embedder.calls(), 0);
    assert_eq!(h.store.search_calls(), 0);
}

#[tokio::test]
async fn empty_context_never_calls_the_model() {
    let clock = Arc::new(ManualClock::starting_now());
    let runtime = WorkflowRuntime::in_memory(clock);
    let mut generator = MockAnswerGenerator::new();
    generator.expect_generate().times(0);

    runtime.register(
        QUERY_EVENT,
        Arc::new(QueryWorkflow::new(
            Arc::new(HashingEmbedder::new(DIM)),
            Arc::new(CountingVectorStore::new(DIM)),
            Arc::new(generator),
        )),
    );

    let (_, status, output) = run_once(
        &runtime,
        QUERY_EVENT,
        json!({"question": "Is anything here?", "isolationKey": "never-ingested"}),
    )
    .await;
    assert_eq!(status, RunStatus::Completed);
    assert_eq!(
        output,
        Some(json!({"answer": NO_CONTEXT_ANSWER, "sources": [], "numContexts": 0}))
    );
}

#[tokio::test]
async fn answer_prompt_contains_ranked_contexts() {
    let h = harness();
    let key = "s1--warranty.pdf";
    let (_, status, _) = run_once(
        &h.runtime,
        INGEST_EVENT,
        json!({"pdf_path": "/tmp/none.pdf", "source_id": key}),
    )
    .await;
    assert_eq!(status, RunStatus::Running);

    let (_, _, output) = run_once(
        &h.runtime,
        QUERY_EVENT,
        json!({"question": "Is labour covered?", "isolationKey": key, "topK": 1}),
    )
    .await;
    assert_eq!(output.unwrap()["numContexts"], 1);

    let requests = h.generator.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .prompt
        .contains("Context:\n- Labour is covered for ninety days.\n\nQuestion: Is labour covered?"));
}

#[tokio::test]
async fn another_session_sees_nothing() {
    let h = harness();
    run_once(
        &h.runtime,
        INGEST_EVENT,
        json!({"documentPath": "/tmp/a.pdf", "isolationKey": "session-a--doc.pdf"}),
    )
    .await;

    let vector = h.embedder.embed_one("warranty").await.unwrap();
    assert!(h
        .store
        .search(&vector, 5, "session-b--doc.pdf")
        .await
        .unwrap()
        .is_empty());
    assert!(h.generator.requests().is_empty());
}
