//!
//! RAGFlow Server - HTTP host for the RAGFlow ingestion and query workflows
//!

/// API module
pub mod api;

/// Remote run client module
pub mod client;

/// Configuration module
pub mod config;

/// Error module
pub mod error;

/// Server module
pub mod server;

/// Server factory module
pub mod server_factory;

// Re-export key types
pub use client::{RemoteRunClient, RemoteRunClientConfig, DEFAULT_API_BASE};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::RagflowServer;
pub use server_factory::{create_server, create_server_with, RagComponents};

/// Build every dependency from `config` and serve until shutdown
pub async fn run(config: ServerConfig) -> ServerResult<()> {
    let server = create_server(config).await?;
    server.run().await
}
