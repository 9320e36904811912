//! Configuration for the RAGFlow Server
//!
//! Defaults come from serde; environment variables override them.
//! A value that cannot be parsed is logged and the default is kept.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::{ServerError, ServerResult};

/// Where workflow state is kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateStoreKind {
    Memory,
    /// Connection string, e.g. `sqlite://ragflow.db`
    Sqlite(String),
}

/// Which vector store backs the workflows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    Qdrant,
    Memory,
}

impl FromStr for VectorStoreKind {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" => Ok(Self::Memory),
            other => Err(ServerError::ConfigurationError(format!(
                "Unknown vector store '{}'",
                other
            ))),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub bind_address: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level filter
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON logs
    #[serde(default)]
    pub log_json: bool,

    /// How long ingested documents stay searchable, in seconds
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// How often due timers are checked, in milliseconds
    #[serde(default = "default_timer_poll_interval_ms")]
    pub timer_poll_interval_ms: u64,

    /// `memory://` or `sqlite://<path>`
    #[serde(default = "default_state_store_url")]
    pub state_store_url: String,

    #[serde(default = "default_vector_store")]
    pub vector_store: VectorStoreKind,

    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    #[serde(default = "default_qdrant_collection")]
    pub qdrant_collection: String,

    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    #[serde(default = "default_vector_dimension")]
    pub vector_dimension: usize,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[serde(default)]
    pub openai_base_url: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_generation_model")]
    pub generation_model: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8288
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_retention_secs() -> u64 {
    600
}

fn default_timer_poll_interval_ms() -> u64 {
    1000
}

fn default_state_store_url() -> String {
    "memory://".to_string()
}

fn default_vector_store() -> VectorStoreKind {
    VectorStoreKind::Qdrant
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_qdrant_collection() -> String {
    "docs".to_string()
}

fn default_vector_dimension() -> usize {
    3072
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_json: false,
            retention_secs: default_retention_secs(),
            timer_poll_interval_ms: default_timer_poll_interval_ms(),
            state_store_url: default_state_store_url(),
            vector_store: default_vector_store(),
            qdrant_url: default_qdrant_url(),
            qdrant_collection: default_qdrant_collection(),
            qdrant_api_key: None,
            vector_dimension: default_vector_dimension(),
            openai_api_key: None,
            openai_base_url: None,
            embedding_model: default_embedding_model(),
            generation_model: default_generation_model(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn parse_into<T: FromStr>(key: &str, raw: &str, target: &mut T) {
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => warn!("Invalid {} value: {}", key, raw),
    }
}

fn parse_flag(key: &str, raw: &str, target: &mut bool) {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => *target = true,
        "false" | "0" | "no" => *target = false,
        _ => warn!("Invalid {} value: {}", key, raw),
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn load_from<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("SERVER_HOST") {
            config.bind_address = host;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            parse_into("SERVER_PORT", &port, &mut config.port);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            parse_flag("LOG_JSON", &json, &mut config.log_json);
        }
        if let Some(secs) = lookup("RETENTION_SECS") {
            parse_into("RETENTION_SECS", &secs, &mut config.retention_secs);
        }
        if let Some(ms) = lookup("TIMER_POLL_INTERVAL_MS") {
            parse_into("TIMER_POLL_INTERVAL_MS", &ms, &mut config.timer_poll_interval_ms);
        }
        if let Some(url) = lookup("STATE_STORE_URL") {
            config.state_store_url = url;
        }
        if let Some(kind) = lookup("VECTOR_STORE") {
            parse_into("VECTOR_STORE", &kind, &mut config.vector_store);
        }
        if let Some(url) = lookup("QDRANT_URL") {
            config.qdrant_url = url;
        }
        if let Some(collection) = lookup("QDRANT_COLLECTION") {
            config.qdrant_collection = collection;
        }
        if let Some(key) = lookup("QDRANT_API_KEY") {
            config.qdrant_api_key = Some(key);
        }
        if let Some(dimension) = lookup("VECTOR_DIMENSION") {
            parse_into("VECTOR_DIMENSION", &dimension, &mut config.vector_dimension);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            config.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            config.openai_base_url = Some(url);
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Some(model) = lookup("GENERATION_MODEL") {
            config.generation_model = model;
        }
        if let Some(size) = lookup("CHUNK_SIZE") {
            parse_into("CHUNK_SIZE", &size, &mut config.chunk_size);
        }
        if let Some(overlap) = lookup("CHUNK_OVERLAP") {
            parse_into("CHUNK_OVERLAP", &overlap, &mut config.chunk_overlap);
        }

        config
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn timer_poll_interval(&self) -> Duration {
        Duration::from_millis(self.timer_poll_interval_ms.max(1))
    }

    pub fn socket_addr(&self) -> ServerResult<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| {
                ServerError::ConfigurationError(format!(
                    "Invalid bind address {}:{}: {}",
                    self.bind_address, self.port, e
                ))
            })
    }

    /// Parse `state_store_url`
    pub fn state_store(&self) -> ServerResult<StateStoreKind> {
        let url = self.state_store_url.trim();
        if url == "memory" || url.starts_with("memory://") {
            Ok(StateStoreKind::Memory)
        } else if url.starts_with("sqlite:") {
            Ok(StateStoreKind::Sqlite(url.to_string()))
        } else {
            Err(ServerError::ConfigurationError(format!(
                "Unsupported STATE_STORE_URL '{}'",
                url
            )))
        }
    }
}
