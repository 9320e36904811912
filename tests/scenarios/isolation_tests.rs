use std::time::Duration;

use futures::future::join_all;
use pretty_assertions::assert_eq;
use serde_json::json;

use ragflow_core::RunStatus;
use ragflow_kb::{IsolationKey, VectorStore, INGEST_EVENT, QUERY_EVENT};
use ragflow_tests::{Scenario, DIMENSION};

#[tokio::test]
async fn concurrent_sessions_never_see_each_other() {
    let scenario = Scenario::with_chunks([
        "Shared wording appears in every document.",
        "Each session repeats the same shared wording.",
    ]);

    let sessions: Vec<String> = (0..8).map(|i| format!("user{}--report.pdf", i)).collect();
    let ingests = sessions.iter().map(|key| {
        scenario.runtime.submit(
            INGEST_EVENT,
            json!({"documentPath": "report.pdf", "isolationKey": key}),
        )
    });
    for trigger in join_all(ingests).await {
        trigger.unwrap();
    }
    scenario.runtime.settle().await;

    for key in &sessions {
        assert_eq!(scenario.store.inner().count_for(key).await, 2);
    }

    let queries = sessions.iter().map(|key| {
        scenario.runtime.submit(
            QUERY_EVENT,
            json!({"question": "shared wording", "topK": 10, "isolationKey": key}),
        )
    });
    let triggers: Vec<_> = join_all(queries)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    scenario.runtime.settle().await;

    for (key, trigger) in sessions.iter().zip(&triggers) {
        let run = scenario.run(trigger).await;
        let output = run.output.unwrap();
        assert_eq!(output["sources"], json!([key]));
        assert_eq!(output["numContexts"], 2);
    }
}

#[tokio::test]
async fn retention_of_one_session_leaves_others_intact() {
    let scenario = Scenario::with_chunks(["Quarterly numbers are up."]);
    scenario
        .submit(
            INGEST_EVENT,
            json!({"documentPath": "q1.pdf", "isolationKey": "early--q1.pdf"}),
        )
        .await;

    scenario.advance(Duration::from_secs(300)).await;
    scenario
        .submit(
            INGEST_EVENT,
            json!({"documentPath": "q2.pdf", "isolationKey": "late--q2.pdf"}),
        )
        .await;

    // Only the first session's ten minutes are up
    assert_eq!(scenario.advance(Duration::from_secs(301)).await, 1);
    assert_eq!(scenario.store.inner().count_for("early--q1.pdf").await, 0);
    assert_eq!(scenario.store.inner().count_for("late--q2.pdf").await, 1);

    let output = scenario
        .ask(json!({"question": "numbers", "isolationKey": "late--q2.pdf"}))
        .await;
    assert_eq!(output["sources"], json!(["late--q2.pdf"]));
}

#[tokio::test]
async fn reingesting_a_key_overwrites_the_same_records() {
    let scenario = Scenario::with_chunks(["one", "two", "three"]);
    let payload = json!({"documentPath": "a.pdf", "isolationKey": "s1--a.pdf"});

    scenario.submit(INGEST_EVENT, payload.clone()).await;
    let first: Vec<_> = (0..3)
        .map(|i| IsolationKey::parse("s1--a.pdf").unwrap().record_id(i))
        .collect();
    scenario.submit(INGEST_EVENT, payload).await;

    assert_eq!(scenario.store.upsert_calls(), 2);
    assert_eq!(scenario.store.inner().len().await, 3);
    for id in first {
        assert!(scenario.store.inner().contains(&id).await);
    }

    // Each ingestion keeps its own timer, so both cleanups run
    assert_eq!(scenario.advance(Duration::from_secs(601)).await, 2);
    assert_eq!(
        scenario.store.deleted_keys(),
        vec!["s1--a.pdf".to_string(), "s1--a.pdf".to_string()]
    );
    assert!(scenario.store.inner().is_empty().await);
}

#[tokio::test]
async fn replaying_an_ingestion_does_not_repeat_side_effects() {
    let scenario = Scenario::with_chunks(["alpha", "beta"]);
    let trigger = scenario
        .submit(
            INGEST_EVENT,
            json!({"documentPath": "a.pdf", "isolationKey": "s1--a.pdf"}),
        )
        .await;

    // Re-enter the suspended instance several times before the wait is over
    for _ in 0..3 {
        scenario.runtime.recover().await.unwrap();
        scenario.runtime.settle().await;
    }
    assert_eq!(scenario.run(&trigger).await.status, RunStatus::Running);
    assert_eq!(scenario.embedder.calls(), 1);
    assert_eq!(scenario.store.upsert_calls(), 1);

    scenario.advance(Duration::from_secs(601)).await;
    scenario.runtime.recover().await.unwrap();
    scenario.runtime.settle().await;

    assert_eq!(scenario.run(&trigger).await.status, RunStatus::Completed);
    assert_eq!(scenario.embedder.calls(), 1);
    assert_eq!(scenario.store.deleted_keys().len(), 1);
}

#[tokio::test]
async fn store_fails_closed_without_an_isolation_key() {
    let scenario = Scenario::with_chunks(["alpha"]);
    scenario
        .submit(
            INGEST_EVENT,
            json!({"documentPath": "a.pdf", "isolationKey": "s1--a.pdf"}),
        )
        .await;

    // A blank key never widens into an unscoped search or delete
    let query = scenario.embedder.vector_for("alpha");
    let result = scenario.store.search(&query, 5, "  ").await.unwrap();
    assert!(result.is_empty());

    scenario.store.delete_by_isolation_key("").await.unwrap();
    assert_eq!(scenario.store.inner().count_for("s1--a.pdf").await, 1);

    let scoped = scenario.store.search(&query, 5, "s1--a.pdf").await.unwrap();
    assert_eq!(scoped.contexts, vec!["alpha".to_string()]);
    assert_eq!(query.len(), DIMENSION);
}
