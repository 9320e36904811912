//! SQLite state store implementation for the RAGFlow platform
//!
//! This crate provides SQLite implementations of the repository interfaces
//! defined in ragflow-core: workflow instances, the step log and persisted
//! timers. A workflow suspended at a durable wait survives a process restart
//! when the runtime is backed by this store.

use ragflow_core::{
    domain::repository::{StepRepository, TimerRepository, WorkflowInstanceRepository},
    CoreError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::SqliteConnection;
pub use repositories::{SqliteStepRepository, SqliteTimerRepository, SqliteWorkflowInstanceRepository};

/// Configuration for the SQLite connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database connection string, e.g. `sqlite://ragflow.db`
    pub connection_string: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Timeout for acquiring a connection from the pool (in seconds)
    pub acquire_timeout_secs: u64,

    /// Whether to run migrations on startup
    pub run_migrations: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            connection_string: "sqlite://ragflow.db".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 30,
            run_migrations: true,
        }
    }
}

/// The repositories the workflow runtime needs, all backed by one database
pub type Repositories = (
    Arc<dyn WorkflowInstanceRepository>,
    Arc<dyn StepRepository>,
    Arc<dyn TimerRepository>,
);

/// A RAGFlow state store that uses SQLite for persistence
#[derive(Clone)]
pub struct SqliteStateStore {
    conn: SqliteConnection,
}

impl SqliteStateStore {
    /// Open a store with the default configuration
    pub async fn new(connection_string: &str) -> Result<Self, CoreError> {
        let config = SqliteConfig {
            connection_string: connection_string.to_string(),
            ..Default::default()
        };

        Self::with_config(config).await
    }

    /// Open a store with a custom configuration
    pub async fn with_config(config: SqliteConfig) -> Result<Self, CoreError> {
        let conn = SqliteConnection::new(&config).await?;
        Ok(Self { conn })
    }

    /// Get the connection
    pub fn connection(&self) -> &SqliteConnection {
        &self.conn
    }

    /// Create all repositories
    pub fn create_repositories(&self) -> Repositories {
        (
            Arc::new(SqliteWorkflowInstanceRepository::new(self.conn.clone())),
            Arc::new(SqliteStepRepository::new(self.conn.clone())),
            Arc::new(SqliteTimerRepository::new(self.conn.clone())),
        )
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.conn.close().await;
    }
}
