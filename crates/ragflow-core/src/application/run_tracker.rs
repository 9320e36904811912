//! Submit events and wait for the output of the run they start.
//!
//! [`RunTracker`] works against any [`RunSource`]: the in-process
//! [`WorkflowRuntime`](crate::application::runtime::WorkflowRuntime) or a
//! remote runtime reached over HTTP. Waiting is bounded by a deadline and
//! never cancels the run it is waiting for.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::workflow_instance::{TriggerId, WorkflowInstance, WorkflowStatus};
use crate::CoreError;

/// How long [`RunTracker::await_result`] waits by default
pub const DEFAULT_AWAIT_TIMEOUT: Duration = Duration::from_secs(120);

/// How often [`RunTracker::await_result`] polls by default
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Externally visible run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    /// Not finished yet, including suspended runs
    Running,
    /// Finished with an output
    Completed,
    /// Finished with an error
    Failed,
    /// Stopped before it finished
    Cancelled,
}

impl RunStatus {
    /// Interpret a status string reported by any runtime.
    ///
    /// Unknown values count as still running.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "completed" | "succeeded" | "success" | "finished" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            "cancelled" | "canceled" => RunStatus::Cancelled,
            _ => RunStatus::Running,
        }
    }

    /// Canonical string form
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::Failed => "Failed",
            RunStatus::Cancelled => "Cancelled",
        }
    }

    /// Whether the run will not change any more
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for RunStatus {
    fn from(value: String) -> Self {
        RunStatus::parse_lenient(&value)
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.as_str().to_string()
    }
}

impl From<WorkflowStatus> for RunStatus {
    fn from(status: WorkflowStatus) -> Self {
        match status {
            WorkflowStatus::Running => RunStatus::Running,
            WorkflowStatus::Completed => RunStatus::Completed,
            WorkflowStatus::Failed => RunStatus::Failed,
            WorkflowStatus::Cancelled => RunStatus::Cancelled,
        }
    }
}

/// One run started by a trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run (workflow instance) id
    pub run_id: String,

    /// Workflow the run executes
    #[serde(default)]
    pub workflow: String,

    /// Current status
    pub status: RunStatus,

    /// Output once completed
    #[serde(default)]
    pub output: Option<Value>,

    /// Error once failed
    #[serde(default)]
    pub error: Option<String>,

    /// Creation time, when the source reports it
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Last update, when the source reports it
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&WorkflowInstance> for RunRecord {
    fn from(instance: &WorkflowInstance) -> Self {
        Self {
            run_id: instance.id.0.clone(),
            workflow: instance.workflow.clone(),
            status: instance.status.into(),
            output: instance.output.clone(),
            error: instance.error.clone(),
            created_at: Some(instance.created_at),
            updated_at: Some(instance.updated_at),
        }
    }
}

/// Something that accepts events and reports the runs they started
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunSource: Send + Sync {
    /// Submit an event and return the trigger id
    async fn submit(&self, event_name: &str, payload: Value) -> Result<TriggerId, CoreError>;

    /// Runs started by a trigger, oldest first
    async fn runs(&self, trigger_id: &TriggerId) -> Result<Vec<RunRecord>, CoreError>;
}

/// Why waiting for a run's output did not produce one
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PollError {
    /// The run reached a failure status
    #[error("Run finished with status {status}: {detail}")]
    RunFailed {
        /// Terminal status
        status: RunStatus,
        /// Error reported by the run
        detail: String,
    },

    /// The deadline passed before the run finished
    #[error(
        "Timed out waiting for run output (last status: {})",
        .last_status.map_or("none", |s| s.as_str())
    )]
    Timeout {
        /// Status seen on the last poll, `None` if no run was visible yet
        last_status: Option<RunStatus>,
    },

    /// The source itself failed
    #[error("Run source error: {0}")]
    Source(CoreError),
}

/// Submits events and polls for their results
#[derive(Clone)]
pub struct RunTracker {
    source: Arc<dyn RunSource>,
}

impl RunTracker {
    /// Create a tracker over a run source
    pub fn new(source: Arc<dyn RunSource>) -> Self {
        Self { source }
    }

    /// Submit an event
    pub async fn submit(&self, event_name: &str, payload: Value) -> Result<TriggerId, PollError> {
        self.source
            .submit(event_name, payload)
            .await
            .map_err(PollError::Source)
    }

    /// Wait for the first run of a trigger to finish and return its output.
    ///
    /// A completed run without output yields `Value::Null`. Transient lookup
    /// errors are retried until the deadline.
    pub async fn await_result(
        &self,
        trigger_id: &TriggerId,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Value, PollError> {
        let deadline = Instant::now() + timeout;
        let mut last_status = None;

        loop {
            let runs = match self.source.runs(trigger_id).await {
                Ok(runs) => runs,
                Err(e) if e.is_transient() => {
                    warn!(trigger_id = %trigger_id, error = %e, "Run lookup failed, polling again");
                    Vec::new()
                }
                Err(e) => return Err(PollError::Source(e)),
            };

            if let Some(run) = runs.first() {
                last_status = Some(run.status);
                match run.status {
                    RunStatus::Completed => return Ok(run.output.clone().unwrap_or(Value::Null)),
                    RunStatus::Failed | RunStatus::Cancelled => {
                        return Err(PollError::RunFailed {
                            status: run.status,
                            detail: run
                                .error
                                .clone()
                                .unwrap_or_else(|| format!("Run {}", run.status)),
                        })
                    }
                    RunStatus::Running => {}
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PollError::Timeout { last_status });
            }

            debug!(trigger_id = %trigger_id, status = ?last_status, "Run not finished, polling again");
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }

    /// [`RunTracker::await_result`] with the default timeout and poll interval
    pub async fn await_result_default(&self, trigger_id: &TriggerId) -> Result<Value, PollError> {
        self.await_result(trigger_id, DEFAULT_AWAIT_TIMEOUT, DEFAULT_POLL_INTERVAL)
            .await
    }

    /// Submit an event and wait for its result
    pub async fn submit_and_wait(
        &self,
        event_name: &str,
        payload: Value,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Value, PollError> {
        let trigger_id = self.submit(event_name, payload).await?;
        self.await_result(&trigger_id, timeout, poll_interval).await
    }
}
