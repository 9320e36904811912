use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::data::{KbError, RecordPayload, SearchResult, VectorRecord};
use crate::storage::{isolation_key_present, validate_query, validate_records};
use crate::traits::VectorStore;

/// Configuration for the Qdrant vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QdrantConfig {
    /// Base URL of the Qdrant REST API
    pub url: String,
    /// Collection holding the chunk vectors
    pub collection: String,
    /// Vector length, fixed when the collection is created
    pub dimension: usize,
    /// Timeout in seconds for HTTP requests
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "docs".to_string(),
            dimension: 3072,
            timeout_secs: 30,
            api_key: None,
        }
    }
}

/// Vector store backed by a Qdrant collection over its REST API.
///
/// Every point carries `{source, text}` as payload. Searches and deletes
/// filter on `source`, so the isolation key is enforced by the server.
#[derive(Debug, Clone)]
pub struct QdrantVectorStore {
    config: QdrantConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct UpsertPoint<'a> {
    id: String,
    vector: &'a [f32],
    payload: &'a RecordPayload,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    points: Vec<UpsertPoint<'a>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    #[serde(default)]
    payload: Option<PointPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct PointPayload {
    #[serde(default)]
    source: String,
    #[serde(default)]
    text: String,
}

fn source_filter(isolation_key: &str) -> serde_json::Value {
    json!({ "must": [{ "key": "source", "match": { "value": isolation_key } }] })
}

impl QdrantVectorStore {
    pub fn new(config: QdrantConfig) -> Result<Self, KbError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KbError::VectorStoreError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &QdrantConfig {
        &self.config
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.config.url.trim_end_matches('/'),
            self.config.collection,
            suffix
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    /// Maps a transport failure. Anything that never got an answer is worth retrying.
    fn map_http_error(error: reqwest::Error) -> KbError {
        if error.is_timeout() {
            KbError::TransientVectorStoreError(format!("Request timeout: {}", error))
        } else if error.is_connect() {
            KbError::TransientVectorStoreError(format!("Connection error: {}", error))
        } else {
            KbError::TransientVectorStoreError(format!("HTTP error: {}", error))
        }
    }

    async fn check_status(response: Response, operation: &str) -> Result<Response, KbError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = format!("{} failed with status {}: {}", operation, status, body);
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(KbError::TransientVectorStoreError(message))
        } else {
            Err(KbError::VectorStoreError(message))
        }
    }

    /// Create the collection with cosine distance when it does not exist yet.
    #[instrument(skip(self), fields(collection = %self.config.collection))]
    pub async fn ensure_collection(&self) -> Result<(), KbError> {
        let response = self
            .authorize(self.client.get(self.collection_url("")))
            .send()
            .await
            .map_err(Self::map_http_error)?;

        if response.status() != StatusCode::NOT_FOUND {
            Self::check_status(response, "collection lookup").await?;
            debug!("Collection already exists");
            return Ok(());
        }

        let body = json!({
            "vectors": { "size": self.config.dimension, "distance": "Cosine" }
        });
        let response = self
            .authorize(self.client.put(self.collection_url("")))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_http_error)?;
        Self::check_status(response, "collection create").await?;

        let index = json!({ "field_name": "source", "field_schema": "keyword" });
        let response = self
            .authorize(self.client.put(self.collection_url("/index?wait=true")))
            .json(&index)
            .send()
            .await
            .map_err(Self::map_http_error)?;
        Self::check_status(response, "payload index create").await?;

        info!(dimension = self.config.dimension, "Created vector collection");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, KbError> {
        if records.is_empty() {
            return Ok(0);
        }
        validate_records(&records, self.config.dimension)?;

        let points: Vec<UpsertPoint<'_>> = records
            .iter()
            .map(|r| UpsertPoint {
                id: r.id.to_string(),
                vector: &r.vector,
                payload: &r.payload,
            })
            .collect();

        let response = self
            .authorize(self.client.put(self.collection_url("/points?wait=true")))
            .json(&UpsertRequest { points })
            .send()
            .await
            .map_err(Self::map_http_error)?;
        Self::check_status(response, "upsert").await?;

        debug!("Upserted points");
        Ok(records.len())
    }

    #[instrument(skip(self))]
    async fn delete_by_isolation_key(&self, isolation_key: &str) -> Result<(), KbError> {
        if !isolation_key_present(isolation_key, "delete") {
            return Ok(());
        }

        let response = self
            .authorize(self.client.post(self.collection_url("/points/delete?wait=true")))
            .json(&json!({ "filter": source_filter(isolation_key) }))
            .send()
            .await
            .map_err(Self::map_http_error)?;
        Self::check_status(response, "delete").await?;

        debug!("Deleted points for isolation key");
        Ok(())
    }

    #[instrument(skip(self, query_vector))]
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        isolation_key: &str,
    ) -> Result<SearchResult, KbError> {
        if !isolation_key_present(isolation_key, "search") {
            return Ok(SearchResult::empty());
        }
        validate_query(query_vector, self.config.dimension)?;
        if top_k == 0 {
            return Ok(SearchResult::empty());
        }

        let body = json!({
            "vector": query_vector,
            "limit": top_k,
            "with_payload": true,
            "filter": source_filter(isolation_key),
        });
        let response = self
            .authorize(self.client.post(self.collection_url("/points/search")))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_http_error)?;
        let response = Self::check_status(response, "search").await?;

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| KbError::VectorStoreError(format!("Malformed search response: {}", e)))?;

        Ok(SearchResult::from_payloads(
            parsed
                .result
                .into_iter()
                .filter_map(|point| point.payload)
                .map(|p| RecordPayload {
                    source: p.source,
                    text: p.text,
                }),
        ))
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}
