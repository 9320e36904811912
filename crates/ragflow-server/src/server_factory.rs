//! Builds a server and everything it depends on from configuration

use std::sync::Arc;
use tracing::info;

use ragflow_core::{SystemClock, WorkflowRuntime};
use ragflow_kb::adapters::{OpenAiAnswerGenerator, OpenAiEmbeddingGenerator, OpenAiSettings};
use ragflow_kb::{
    AnswerGenerator, DocumentChunker, EmbeddingGenerator, InMemoryVectorStore, IngestionWorkflow,
    QdrantConfig, QdrantVectorStore, QueryWorkflow, TextChunker, VectorStore, INGEST_EVENT,
    QUERY_EVENT,
};
use ragflow_state_sqlite::SqliteStateStore;

use crate::config::{ServerConfig, StateStoreKind, VectorStoreKind};
use crate::error::{ServerError, ServerResult};
use crate::server::RagflowServer;

/// The collaborators the two RAG workflows are built from
#[derive(Clone)]
pub struct RagComponents {
    pub chunker: Arc<dyn DocumentChunker>,
    pub embedder: Arc<dyn EmbeddingGenerator>,
    pub store: Arc<dyn VectorStore>,
    pub generator: Arc<dyn AnswerGenerator>,
}

/// Create the workflow runtime selected by `STATE_STORE_URL`
pub async fn create_runtime(config: &ServerConfig) -> ServerResult<WorkflowRuntime> {
    let clock = Arc::new(SystemClock);
    match config.state_store()? {
        StateStoreKind::Memory => {
            info!("Using in-memory workflow state");
            Ok(WorkflowRuntime::in_memory(clock))
        }
        StateStoreKind::Sqlite(url) => {
            info!(url = %url, "Using SQLite workflow state");
            let store = SqliteStateStore::new(&url).await?;
            let (instances, steps, timers) = store.create_repositories();
            Ok(WorkflowRuntime::new(instances, steps, timers, clock))
        }
    }
}

/// Create the vector store, chunker and model clients selected by configuration
pub async fn create_components(config: &ServerConfig) -> ServerResult<RagComponents> {
    let store: Arc<dyn VectorStore> = match config.vector_store {
        VectorStoreKind::Memory => Arc::new(InMemoryVectorStore::new(config.vector_dimension)),
        VectorStoreKind::Qdrant => {
            let qdrant = QdrantVectorStore::new(QdrantConfig {
                url: config.qdrant_url.clone(),
                collection: config.qdrant_collection.clone(),
                dimension: config.vector_dimension,
                api_key: config.qdrant_api_key.clone(),
                ..Default::default()
            })?;
            qdrant.ensure_collection().await?;
            Arc::new(qdrant)
        }
    };

    let api_key = config.openai_api_key.clone().ok_or_else(|| {
        ServerError::ConfigurationError("OPENAI_API_KEY is required".to_string())
    })?;
    let settings = OpenAiSettings {
        api_key,
        api_base: config.openai_base_url.clone(),
        embedding_model: config.embedding_model.clone(),
        chat_model: config.generation_model.clone(),
    };

    Ok(RagComponents {
        chunker: Arc::new(TextChunker::new(config.chunk_size, config.chunk_overlap)?),
        embedder: Arc::new(OpenAiEmbeddingGenerator::new(&settings)),
        store,
        generator: Arc::new(OpenAiAnswerGenerator::new(&settings)),
    })
}

/// Register the ingestion and query workflows on `runtime`
pub fn register_workflows(runtime: &WorkflowRuntime, config: &ServerConfig, components: RagComponents) {
    runtime.register(
        INGEST_EVENT,
        Arc::new(
            IngestionWorkflow::new(
                components.chunker,
                components.embedder.clone(),
                components.store.clone(),
            )
            .with_retention(config.retention()),
        ),
    );
    runtime.register(
        QUERY_EVENT,
        Arc::new(QueryWorkflow::new(
            components.embedder,
            components.store,
            components.generator,
        )),
    );
}

/// Assemble a server from explicit parts
pub fn create_server_with(
    config: ServerConfig,
    runtime: WorkflowRuntime,
    components: RagComponents,
) -> RagflowServer {
    register_workflows(&runtime, &config, components);
    RagflowServer::new(config, runtime)
}

/// Create a new server instance with all required dependencies
pub async fn create_server(config: ServerConfig) -> ServerResult<RagflowServer> {
    let runtime = create_runtime(&config).await?;
    let components = create_components(&config).await?;
    Ok(create_server_with(config, runtime, components))
}
