//! HTTP client for a running RAGFlow server
//!
//! [`RemoteRunClient`] implements [`RunSource`], so a [`ragflow_core::RunTracker`]
//! can submit events to, and poll runs from, a server in another process.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use ragflow_core::{CoreError, RunRecord, RunSource, TriggerId};

use crate::api::events::SendEventResponse;
use crate::api::runs::RunsResponse;

/// Base used when `RAGFLOW_API_BASE` is not set
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8288/v1";

/// Configuration for the remote run client
#[derive(Debug, Clone)]
pub struct RemoteRunClientConfig {
    /// Versioned API base, e.g. `http://127.0.0.1:8288/v1`
    pub service_url: String,
    /// Timeout in seconds for HTTP requests
    pub timeout_secs: u64,
}

impl Default for RemoteRunClientConfig {
    fn default() -> Self {
        Self {
            service_url: std::env::var("RAGFLOW_API_BASE")
                .ok()
                .filter(|base| !base.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteRunClient {
    config: RemoteRunClientConfig,
    client: Client,
}

impl RemoteRunClient {
    pub fn new(config: RemoteRunClientConfig) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::ConfigurationError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn with_url(service_url: impl Into<String>) -> Result<Self, CoreError> {
        Self::new(RemoteRunClientConfig {
            service_url: service_url.into(),
            ..Default::default()
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.service_url.trim_end_matches('/'), path)
    }

    /// Maps an HTTP error to a CoreError
    fn map_http_error(error: reqwest::Error) -> CoreError {
        if error.is_timeout() {
            CoreError::TimeoutError(format!("Request timeout: {}", error))
        } else if error.is_connect() {
            CoreError::ExternalDependencyError(format!("Connection error: {}", error))
        } else {
            CoreError::ExternalDependencyError(format!("HTTP error: {}", error))
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body["error"]["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("server answered {}", status));

        Err(match status {
            StatusCode::NOT_FOUND => CoreError::WorkflowNotFound(message),
            StatusCode::BAD_REQUEST => CoreError::ValidationError(message),
            s if s.is_server_error() => CoreError::ExternalDependencyError(message),
            _ => CoreError::Other(message),
        })
    }
}

#[async_trait]
impl RunSource for RemoteRunClient {
    #[instrument(skip(self, payload))]
    async fn submit(&self, event_name: &str, payload: Value) -> Result<TriggerId, CoreError> {
        let response = self
            .client
            .post(self.url("/events"))
            .json(&json!({ "name": event_name, "data": payload }))
            .send()
            .await
            .map_err(Self::map_http_error)?;
        let response = Self::check_status(response).await?;

        let body: SendEventResponse = response.json().await.map_err(|e| {
            CoreError::SerializationError(format!("Malformed event response: {}", e))
        })?;
        let trigger = body.ids.into_iter().next().ok_or_else(|| {
            CoreError::ExternalDependencyError("Server returned no trigger id".to_string())
        })?;

        debug!(trigger_id = %trigger, "Event submitted");
        Ok(TriggerId(trigger))
    }

    #[instrument(skip(self), fields(trigger_id = %trigger_id))]
    async fn runs(&self, trigger_id: &TriggerId) -> Result<Vec<RunRecord>, CoreError> {
        let response = self
            .client
            .get(self.url(&format!("/events/{}/runs", trigger_id.0)))
            .send()
            .await
            .map_err(Self::map_http_error)?;
        let response = Self::check_status(response).await?;

        let body: RunsResponse = response.json().await.map_err(|e| {
            CoreError::SerializationError(format!("Malformed runs response: {}", e))
        })?;
        Ok(body.data)
    }
}
