use crate::{
    domain::events::{
        DomainEvent, WorkflowCancelled, WorkflowCompleted, WorkflowFailed, WorkflowStarted,
        WorkflowSuspended,
    },
    CoreError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Workflow instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStatus {
    /// Instance is executing or suspended at a durable wait
    Running,

    /// Instance returned its output
    Completed,

    /// Instance failed
    Failed,

    /// Instance was cancelled before it finished
    Cancelled,
}

impl WorkflowStatus {
    /// Terminal statuses never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowStatus::Running)
    }

    /// Stable string form used by the stores and the HTTP API
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Running => "Running",
            WorkflowStatus::Completed => "Completed",
            WorkflowStatus::Failed => "Failed",
            WorkflowStatus::Cancelled => "Cancelled",
        }
    }

    /// Parse the string form written by [`WorkflowStatus::as_str`]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Running" => Some(WorkflowStatus::Running),
            "Completed" => Some(WorkflowStatus::Completed),
            "Failed" => Some(WorkflowStatus::Failed),
            "Cancelled" => Some(WorkflowStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value object: Workflow Instance ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowInstanceId(pub String);

impl WorkflowInstanceId {
    /// Generate a fresh random id
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for WorkflowInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value object: id returned when an event is submitted; groups the runs it started
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerId(pub String);

impl TriggerId {
    /// Generate a fresh random id
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Aggregate: Workflow instance
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Unique identifier
    pub id: WorkflowInstanceId,

    /// Name of the workflow this instance runs
    pub workflow: String,

    /// Trigger that created the instance
    pub trigger_id: TriggerId,

    /// Name of the event that created the instance
    pub event_name: String,

    /// Event payload the workflow was started with
    pub trigger_data: Value,

    /// Current status
    pub status: WorkflowStatus,

    /// Output returned by the workflow once completed
    pub output: Option<Value>,

    /// Error message if the instance failed
    pub error: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,

    /// Domain events
    #[serde(skip)]
    pub events: Vec<Box<dyn DomainEvent>>,
}

impl Clone for WorkflowInstance {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            workflow: self.workflow.clone(),
            trigger_id: self.trigger_id.clone(),
            event_name: self.event_name.clone(),
            trigger_data: self.trigger_data.clone(),
            status: self.status,
            output: self.output.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            events: Vec::new(), // We don't clone domain events
        }
    }
}

impl WorkflowInstance {
    /// Create a running instance for a submitted event
    pub fn new(
        workflow: impl Into<String>,
        trigger_id: TriggerId,
        event_name: impl Into<String>,
        trigger_data: Value,
        now: DateTime<Utc>,
    ) -> Self {
        let id = WorkflowInstanceId::new_v4();
        let workflow = workflow.into();

        let mut instance = Self {
            id: id.clone(),
            workflow: workflow.clone(),
            trigger_id,
            event_name: event_name.into(),
            trigger_data,
            status: WorkflowStatus::Running,
            output: None,
            error: None,
            created_at: now,
            updated_at: now,
            events: Vec::with_capacity(4),
        };

        instance.record_event(Box::new(WorkflowStarted {
            instance_id: id,
            workflow,
            timestamp: now,
        }));

        instance
    }

    fn ensure_running(&self, action: &str) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::InvalidStateTransition(format!(
                "Cannot {} workflow instance {} in state: {:?}",
                action, self.id, self.status
            )));
        }
        Ok(())
    }

    /// Note that the instance yielded at a durable wait; the status stays `Running`
    pub fn suspend(
        &mut self,
        step_name: &str,
        wake_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.ensure_running("suspend")?;
        self.updated_at = now;

        self.record_event(Box::new(WorkflowSuspended {
            instance_id: self.id.clone(),
            step_name: step_name.to_string(),
            wake_at,
            timestamp: now,
        }));

        Ok(())
    }

    /// Complete the instance with the workflow output
    pub fn complete(&mut self, output: Value, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_running("complete")?;

        self.status = WorkflowStatus::Completed;
        self.output = Some(output);
        self.updated_at = now;

        self.record_event(Box::new(WorkflowCompleted {
            instance_id: self.id.clone(),
            timestamp: now,
        }));

        Ok(())
    }

    /// Fail the instance
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_running("fail")?;

        let error = error.into();
        self.status = WorkflowStatus::Failed;
        self.error = Some(error.clone());
        self.updated_at = now;

        self.record_event(Box::new(WorkflowFailed {
            instance_id: self.id.clone(),
            error,
            timestamp: now,
        }));

        Ok(())
    }

    /// Cancel the instance
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_running("cancel")?;

        self.status = WorkflowStatus::Cancelled;
        self.updated_at = now;

        self.record_event(Box::new(WorkflowCancelled {
            instance_id: self.id.clone(),
            timestamp: now,
        }));

        Ok(())
    }

    /// Record a domain event
    pub fn record_event(&mut self, event: Box<dyn DomainEvent>) {
        self.events.push(event);
    }

    /// Take all recorded events, leaving the buffer empty
    pub fn take_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }
}
