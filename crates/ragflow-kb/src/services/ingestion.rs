//! Document ingestion with a retention window
//!
//! `load_and_chunk -> embed_and_upsert -> retention_wait -> cleanup_data`.
//! Each step is memoized by the step executor, so a run resumed after the
//! retention wait does not chunk or embed the document again.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use ragflow_core::{CoreError, StepContext, StepError, Workflow};

use super::events::{IngestOutput, IngestRequest};
use crate::data::{Chunk, IsolationKey, KbError, RecordPayload, VectorRecord};
use crate::traits::{DocumentChunker, EmbeddingGenerator, VectorStore};

pub const INGEST_WORKFLOW: &str = "rag-ingest-pdf";

/// How long ingested data stays searchable
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(600);

pub const EXPIRED_STATUS: &str = "Session expired, data wiped.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Ingested {
    ingested: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Cleanup {
    document_removed: bool,
}

/// Embeds `chunks` and writes them under `isolation_key`. Returns the number of chunks written.
pub async fn embed_and_upsert(
    embedder: &dyn EmbeddingGenerator,
    store: &dyn VectorStore,
    isolation_key: &IsolationKey,
    chunks: &[Chunk],
) -> Result<usize, KbError> {
    if chunks.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed(&texts).await?;
    if vectors.len() != chunks.len() {
        return Err(KbError::EmbeddingError(format!(
            "expected {} embeddings, got {}",
            chunks.len(),
            vectors.len()
        )));
    }

    let records = chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, vector)| VectorRecord {
            id: isolation_key.record_id(chunk.index),
            vector,
            payload: RecordPayload {
                source: isolation_key.to_string(),
                text: chunk.text.clone(),
            },
        })
        .collect();

    store.upsert(records).await?;
    Ok(chunks.len())
}

/// Drops every vector under `isolation_key` and the uploaded document.
/// Returns whether a document file was actually removed.
pub async fn wipe_session(
    store: &dyn VectorStore,
    isolation_key: &IsolationKey,
    document: &Path,
) -> Result<bool, KbError> {
    store.delete_by_isolation_key(isolation_key.as_str()).await?;

    match tokio::fs::remove_file(document).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(KbError::IoError(format!("{}: {}", document.display(), e))),
    }
}

/// Ingests one document, keeps it searchable for the retention period, then wipes it.
pub struct IngestionWorkflow {
    chunker: Arc<dyn DocumentChunker>,
    embedder: Arc<dyn EmbeddingGenerator>,
    store: Arc<dyn VectorStore>,
    retention: Duration,
}

impl IngestionWorkflow {
    pub fn new(
        chunker: Arc<dyn DocumentChunker>,
        embedder: Arc<dyn EmbeddingGenerator>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            store,
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }
}

#[async_trait]
impl Workflow for IngestionWorkflow {
    fn name(&self) -> &str {
        INGEST_WORKFLOW
    }

    async fn execute(&self, ctx: &StepContext, payload: &Value) -> Result<Value, StepError> {
        let request = match IngestRequest::from_payload(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(instance_id = %ctx.instance_id(), error = %e, "Rejected ingestion payload");
                return Ok(json!(IngestOutput {
                    status: format!("Error: {}", e),
                    ingested_count: 0,
                }));
            }
        };
        let key = request.isolation_key;
        let document = PathBuf::from(&request.document_path);

        let chunker = self.chunker.clone();
        let path = document.clone();
        let chunks: Vec<Chunk> = ctx
            .run("load_and_chunk", move || {
                let chunker = chunker.clone();
                let path = path.clone();
                async move { Ok::<_, CoreError>(chunker.chunk(&path).await?) }
            })
            .await?;

        let embedder = self.embedder.clone();
        let store = self.store.clone();
        let upsert_key = key.clone();
        let ingested: Ingested = ctx
            .run("embed_and_upsert", move || {
                let embedder = embedder.clone();
                let store = store.clone();
                let key = upsert_key.clone();
                let chunks = chunks.clone();
                async move {
                    let ingested =
                        embed_and_upsert(embedder.as_ref(), store.as_ref(), &key, &chunks).await?;
                    Ok::<_, CoreError>(Ingested { ingested })
                }
            })
            .await?;

        info!(
            instance_id = %ctx.instance_id(),
            isolation_key = %key,
            document = key.display_name(),
            ingested = ingested.ingested,
            "Document ingested"
        );

        ctx.sleep("retention_wait", self.retention).await?;

        let store = self.store.clone();
        let cleanup_key = key.clone();
        let cleanup: Cleanup = ctx
            .run("cleanup_data", move || {
                let store = store.clone();
                let key = cleanup_key.clone();
                let document = document.clone();
                async move {
                    let document_removed = wipe_session(store.as_ref(), &key, &document).await?;
                    Ok::<_, CoreError>(Cleanup { document_removed })
                }
            })
            .await?;

        info!(
            instance_id = %ctx.instance_id(),
            isolation_key = %key,
            document = key.display_name(),
            document_removed = cleanup.document_removed,
            "Session data wiped"
        );

        Ok(json!(IngestOutput {
            status: EXPIRED_STATUS.to_string(),
            ingested_count: ingested.ingested,
        }))
    }
}
