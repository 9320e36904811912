use ragflow_core::CoreError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::migrations;
use crate::SqliteConfig;

/// Database connection manager for SQLite
#[derive(Clone, Debug)]
pub struct SqliteConnection {
    pool: SqlitePool,
}

impl SqliteConnection {
    /// Open the database, creating the file if needed, and optionally migrate it
    pub async fn new(config: &SqliteConfig) -> Result<Self, CoreError> {
        let in_memory = config.connection_string.contains(":memory:");

        let options = SqliteConnectOptions::from_str(&config.connection_string)
            .map_err(|e| {
                CoreError::ConfigurationError(format!(
                    "Invalid SQLite connection string '{}': {}",
                    config.connection_string, e
                ))
            })?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(config.acquire_timeout_secs));
        let options = if in_memory {
            options
        } else {
            options.journal_mode(SqliteJournalMode::Wal)
        };

        // Every connection to ":memory:" is a separate database
        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { config.max_connections.max(1) })
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| CoreError::StateStoreError(format!("Failed to connect to SQLite: {}", e)))?;
        debug!(connection = %config.connection_string, "Connected to SQLite database");

        let conn = Self { pool };
        if config.run_migrations {
            conn.run_migrations().await?;
        }

        Ok(conn)
    }

    /// Apply the schema migrations
    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        for (migration_name, migration_sql) in migrations::generate_migrations() {
            debug!("Applying migration: {}", migration_name);

            sqlx::query(migration_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    CoreError::StateStoreError(format!(
                        "Migration '{}' failed: {}",
                        migration_name, e
                    ))
                })?;
        }

        info!("SQLite migrations completed successfully");
        Ok(())
    }

    /// Get a reference to the database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
