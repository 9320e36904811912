use crate::domain::workflow_instance::WorkflowInstanceId;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Domain event trait for all lifecycle events in the system
pub trait DomainEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the workflow instance ID this event is associated with
    fn instance_id(&self) -> &WorkflowInstanceId;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Event: Workflow instance started
#[derive(Debug)]
pub struct WorkflowStarted {
    /// The unique identifier of the workflow instance
    pub instance_id: WorkflowInstanceId,

    /// Name of the workflow that was started
    pub workflow: String,

    /// The timestamp when the instance was created
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for WorkflowStarted {
    fn event_type(&self) -> &'static str {
        "workflow.started"
    }

    fn instance_id(&self) -> &WorkflowInstanceId {
        &self.instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Workflow instance suspended at a durable wait
#[derive(Debug)]
pub struct WorkflowSuspended {
    /// The unique identifier of the workflow instance
    pub instance_id: WorkflowInstanceId,

    /// The sleep step that suspended the instance
    pub step_name: String,

    /// When the instance becomes eligible to resume
    pub wake_at: DateTime<Utc>,

    /// The timestamp when the instance was suspended
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for WorkflowSuspended {
    fn event_type(&self) -> &'static str {
        "workflow.suspended"
    }

    fn instance_id(&self) -> &WorkflowInstanceId {
        &self.instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Workflow instance completed
#[derive(Debug)]
pub struct WorkflowCompleted {
    /// The unique identifier of the workflow instance
    pub instance_id: WorkflowInstanceId,

    /// The timestamp when the instance completed
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for WorkflowCompleted {
    fn event_type(&self) -> &'static str {
        "workflow.completed"
    }

    fn instance_id(&self) -> &WorkflowInstanceId {
        &self.instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Workflow instance failed
#[derive(Debug)]
pub struct WorkflowFailed {
    /// The unique identifier of the workflow instance
    pub instance_id: WorkflowInstanceId,

    /// Failure detail
    pub error: String,

    /// The timestamp when the instance failed
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for WorkflowFailed {
    fn event_type(&self) -> &'static str {
        "workflow.failed"
    }

    fn instance_id(&self) -> &WorkflowInstanceId {
        &self.instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Workflow instance cancelled
#[derive(Debug)]
pub struct WorkflowCancelled {
    /// The unique identifier of the workflow instance
    pub instance_id: WorkflowInstanceId,

    /// The timestamp when the instance was cancelled
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for WorkflowCancelled {
    fn event_type(&self) -> &'static str {
        "workflow.cancelled"
    }

    fn instance_id(&self) -> &WorkflowInstanceId {
        &self.instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
