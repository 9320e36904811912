use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use ragflow_core::{ManualClock, RunStatus, WorkflowRuntime};
use ragflow_kb::test_utils::{CountingVectorStore, HashingEmbedder, MockAnswerGenerator, StaticChunker};
use ragflow_kb::{
    IngestionWorkflow, QueryWorkflow, TextChunker, EXPIRED_STATUS, INGEST_EVENT,
    NO_CONTEXT_ANSWER, NO_SESSION_ANSWER, QUERY_EVENT,
};
use ragflow_tests::{Scenario, DIMENSION};

#[tokio::test]
async fn ingested_session_is_wiped_when_retention_elapses() {
    let scenario = Scenario::with_chunks([
        "Alpha covers the installation steps.",
        "Beta lists the supported platforms.",
        "Gamma describes the upgrade path.",
    ]);

    let trigger = scenario
        .submit(
            INGEST_EVENT,
            json!({"documentPath": "a.pdf", "isolationKey": "s1--a.pdf"}),
        )
        .await;

    // Suspended at the retention wait with the data searchable
    assert_eq!(scenario.run(&trigger).await.status, RunStatus::Running);
    assert_eq!(scenario.store.inner().count_for("s1--a.pdf").await, 3);

    assert_eq!(scenario.advance(Duration::from_secs(599)).await, 0);
    assert_eq!(scenario.store.inner().count_for("s1--a.pdf").await, 3);

    assert_eq!(scenario.advance(Duration::from_secs(2)).await, 1);
    let run = scenario.run(&trigger).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(
        run.output,
        Some(json!({"status": EXPIRED_STATUS, "ingestedCount": 3}))
    );
    assert_eq!(scenario.store.inner().count_for("s1--a.pdf").await, 0);
    assert_eq!(scenario.store.deleted_keys(), vec!["s1--a.pdf".to_string()]);
}

#[tokio::test]
async fn document_without_text_still_expires() {
    let scenario = Scenario::with_chunks(Vec::<String>::new());

    let trigger = scenario
        .submit(
            INGEST_EVENT,
            json!({"documentPath": "blank.pdf", "isolationKey": "s0--blank.pdf"}),
        )
        .await;

    assert_eq!(scenario.run(&trigger).await.status, RunStatus::Running);
    assert_eq!(scenario.store.upsert_calls(), 0);
    assert_eq!(scenario.store.inner().count_for("s0--blank.pdf").await, 0);

    assert_eq!(scenario.advance(Duration::from_secs(601)).await, 1);
    let run = scenario.run(&trigger).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(
        run.output,
        Some(json!({"status": EXPIRED_STATUS, "ingestedCount": 0}))
    );
    assert_eq!(scenario.store.deleted_keys(), vec!["s0--blank.pdf".to_string()]);
}

#[tokio::test]
async fn query_before_expiry_answers_from_session_contexts() {
    let scenario = Scenario::with_chunks([
        "X is a message broker written in Rust.",
        "X persists messages to an append-only log.",
    ]);
    scenario
        .submit(
            INGEST_EVENT,
            json!({"documentPath": "a.pdf", "isolationKey": "s1--a.pdf"}),
        )
        .await;

    let output = scenario
        .ask(json!({"question": "What is X?", "topK": 5, "isolationKey": "s1--a.pdf"}))
        .await;

    assert!(!output["answer"].as_str().unwrap().is_empty());
    assert!(output["sources"].as_array().unwrap().len() <= 2);
    assert_eq!(output["sources"], json!(["s1--a.pdf"]));
    assert_eq!(output["numContexts"], 2);

    let requests = scenario.generator.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].prompt.contains("What is X?"));
    assert!(requests[0].prompt.contains("append-only log"));
}

#[tokio::test]
async fn query_without_session_is_answered_without_any_step() {
    let scenario = Scenario::with_chunks(["unused"]);

    let output = scenario.ask(json!({"question": "What is X?"})).await;

    assert_eq!(
        output,
        json!({"answer": NO_SESSION_ANSWER, "sources": [], "numContexts": 0})
    );
    assert_eq!(scenario.embedder.calls(), 0);
    assert_eq!(scenario.store.search_calls(), 0);
    assert!(scenario.generator.requests().is_empty());
}

#[tokio::test]
async fn empty_context_short_circuits_generation() {
    let clock = Arc::new(ManualClock::starting_now());
    let runtime = WorkflowRuntime::in_memory(clock);
    let store = CountingVectorStore::new(DIMENSION);
    let embedder = Arc::new(HashingEmbedder::new(DIMENSION));

    let mut generator = MockAnswerGenerator::new();
    generator.expect_generate().times(0);

    runtime.register(
        INGEST_EVENT,
        Arc::new(IngestionWorkflow::new(
            Arc::new(StaticChunker::new(["unused"])),
            embedder.clone(),
            Arc::new(store.clone()),
        )),
    );
    runtime.register(
        QUERY_EVENT,
        Arc::new(QueryWorkflow::new(
            embedder,
            Arc::new(store.clone()),
            Arc::new(generator),
        )),
    );

    let trigger = runtime
        .submit(
            QUERY_EVENT,
            json!({"question": "Anything?", "isolationKey": "never--ingested.pdf"}),
        )
        .await
        .unwrap();
    runtime.settle().await;

    let runs = runtime.runs_for_trigger(&trigger).await.unwrap();
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(
        runs[0].output,
        Some(json!({"answer": NO_CONTEXT_ANSWER, "sources": [], "numContexts": 0}))
    );
    assert_eq!(store.search_calls(), 1);
}

#[tokio::test]
async fn expired_session_has_no_context_left() {
    let scenario = Scenario::with_chunks(["Refunds are processed in five days."]);
    scenario
        .submit(
            INGEST_EVENT,
            json!({"documentPath": "refunds.pdf", "isolationKey": "s9--refunds.pdf"}),
        )
        .await;
    scenario.advance(Duration::from_secs(601)).await;

    let output = scenario
        .ask(json!({"question": "How long do refunds take?", "isolationKey": "s9--refunds.pdf"}))
        .await;

    assert_eq!(output["answer"], NO_CONTEXT_ANSWER);
    assert_eq!(output["numContexts"], 0);
    assert!(scenario.generator.requests().is_empty());
}

#[tokio::test]
async fn document_file_is_chunked_and_removed_on_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("manual.txt");
    let text = "The pump must be primed before first use. ".repeat(60);
    std::fs::write(&document, &text).unwrap();

    let scenario = Scenario::with_chunker(Arc::new(TextChunker::new(400, 50).unwrap()));
    let trigger = scenario
        .submit(
            INGEST_EVENT,
            json!({
                "documentPath": document.display().to_string(),
                "isolationKey": "s3--manual.txt",
            }),
        )
        .await;

    let stored = scenario.store.inner().count_for("s3--manual.txt").await;
    assert!(stored > 1, "expected several chunks, got {}", stored);

    let output = scenario
        .ask(json!({"question": "What before first use?", "isolationKey": "s3--manual.txt", "topK": 2}))
        .await;
    assert_eq!(output["numContexts"], 2);

    scenario.advance(Duration::from_secs(601)).await;
    let run = scenario.run(&trigger).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.output.unwrap()["ingestedCount"], stored);
    assert!(!document.exists());
}

#[tokio::test]
async fn unreadable_document_fails_the_ingestion_run() {
    let scenario = Scenario::with_chunker(Arc::new(TextChunker::new(400, 50).unwrap()));

    let trigger = scenario
        .submit(
            INGEST_EVENT,
            json!({"documentPath": "/definitely/not/here.txt", "isolationKey": "s4--here.txt"}),
        )
        .await;

    let run = scenario.run(&trigger).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.unwrap().contains("load_and_chunk"));
    assert_eq!(scenario.store.upsert_calls(), 0);
}
