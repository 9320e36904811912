use pretty_assertions::assert_eq;
use ragflow_kb::{
    IsolationKey, KbError, QdrantConfig, QdrantVectorStore, RecordPayload, VectorRecord,
    VectorStore,
};
use serde_json::json;
use wiremock::matchers::{any, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer) -> QdrantVectorStore {
    QdrantVectorStore::new(QdrantConfig {
        url: server.uri(),
        collection: "docs".to_string(),
        dimension: 3,
        timeout_secs: 5,
        api_key: None,
    })
    .unwrap()
}

fn record(key: &IsolationKey, index: usize, text: &str) -> VectorRecord {
    VectorRecord {
        id: key.record_id(index),
        vector: vec![0.1, 0.2, 0.3],
        payload: RecordPayload {
            source: key.to_string(),
            text: text.to_string(),
        },
    }
}

#[test]
fn default_config_matches_the_deployment() {
    let config = QdrantConfig::default();
    assert_eq!(config.url, "http://localhost:6333");
    assert_eq!(config.collection, "docs");
    assert_eq!(config.dimension, 3072);
    assert_eq!(config.timeout_secs, 30);
}

#[tokio::test]
async fn ensure_collection_creates_a_missing_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/docs"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/docs"))
        .and(body_partial_json(json!({"vectors": {"size": 3, "distance": "Cosine"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/docs/index"))
        .and(body_partial_json(json!({"field_name": "source"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server).ensure_collection().await.unwrap();
}

#[tokio::test]
async fn ensure_collection_leaves_an_existing_collection_alone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    store_for(&server).ensure_collection().await.unwrap();
}

#[tokio::test]
async fn upsert_sends_points_with_source_payload() {
    let server = MockServer::start().await;
    let key = IsolationKey::parse("s1--doc.pdf").unwrap();

    Mock::given(method("PUT"))
        .and(path("/collections/docs/points"))
        .and(query_param("wait", "true"))
        .and(body_partial_json(json!({
            "points": [{
                "id": key.record_id(0).to_string(),
                "payload": {"source": "s1--doc.pdf", "text": "alpha"}
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let written = store_for(&server)
        .upsert(vec![record(&key, 0, "alpha")])
        .await
        .unwrap();
    assert_eq!(written, 1);
}

#[tokio::test]
async fn upsert_rejects_wrong_dimension_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let key = IsolationKey::parse("k").unwrap();
    let mut bad = record(&key, 0, "alpha");
    bad.vector = vec![1.0; 5];

    let err = store_for(&server).upsert(vec![bad]).await.unwrap_err();
    assert_eq!(err, KbError::DimensionMismatch { expected: 3, actual: 5 });
}

#[tokio::test]
async fn delete_filters_on_the_isolation_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/delete"))
        .and(query_param("wait", "true"))
        .and(body_partial_json(json!({
            "filter": {"must": [{"key": "source", "match": {"value": "s1--doc.pdf"}}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server)
        .delete_by_isolation_key("s1--doc.pdf")
        .await
        .unwrap();
}

#[tokio::test]
async fn search_parses_ranked_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/search"))
        .and(body_partial_json(json!({
            "limit": 2,
            "with_payload": true,
            "filter": {"must": [{"key": "source", "match": {"value": "k"}}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "result": [
                {"id": "a", "score": 0.9, "payload": {"source": "k", "text": "best"}},
                {"id": "b", "score": 0.8, "payload": {"source": "k", "text": ""}},
                {"id": "c", "score": 0.7, "payload": {"source": "k", "text": "next"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let found = store_for(&server)
        .search(&[0.1, 0.2, 0.3], 2, "k")
        .await
        .unwrap();
    assert_eq!(found.contexts, vec!["best", "next"]);
    assert_eq!(found.sources, vec!["k"]);
}

#[tokio::test]
async fn blank_key_never_reaches_the_server() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = store_for(&server);
    assert!(store.search(&[0.1, 0.2, 0.3], 5, "").await.unwrap().is_empty());
    store.delete_by_isolation_key("  ").await.unwrap();
}

#[tokio::test]
async fn server_errors_are_transient_and_client_errors_are_not() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/delete"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad filter"))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.search(&[0.1, 0.2, 0.3], 5, "k").await.unwrap_err();
    assert!(matches!(err, KbError::TransientVectorStoreError(_)));
    assert!(err.is_transient());

    let err = store.delete_by_isolation_key("k").await.unwrap_err();
    match err {
        KbError::VectorStoreError(message) => assert!(message.contains("bad filter")),
        other => panic!("expected permanent error, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_server_is_transient() {
    let store = QdrantVectorStore::new(QdrantConfig {
        url: "http://127.0.0.1:1".to_string(),
        dimension: 3,
        timeout_secs: 2,
        ..Default::default()
    })
    .unwrap();

    let err = store.search(&[0.1, 0.2, 0.3], 5, "k").await.unwrap_err();
    assert!(err.is_transient());
}
