//!
//! RAGFlow Core - Durable workflow runtime for the RAGFlow platform
//!
//! This crate holds the step executor, the workflow runtime and the run
//! tracker, together with the domain model they persist. Workflows written
//! against [`StepContext`] survive restarts: completed steps are replayed
//! from the step log and durable waits resume from persisted timers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - workflow instances, step log, timers and lifecycle events
pub mod domain;

/// Application services - step execution, runtime and run tracking
pub mod application;

/// Error types
pub mod error;

// Re-export key types
pub use error::CoreError;

pub use application::clock::{Clock, ManualClock, SystemClock};
pub use application::retry::RetryPolicy;
pub use application::run_tracker::{
    PollError, RunRecord, RunSource, RunStatus, RunTracker, DEFAULT_AWAIT_TIMEOUT,
    DEFAULT_POLL_INTERVAL,
};
pub use application::runtime::{DomainEventHandler, LoggingEventHandler, WorkflowRuntime};
pub use application::step_executor::{StepContext, StepError, StepExecutor};
pub use application::workflow::Workflow;

pub use domain::events::DomainEvent;
pub use domain::repository::{StepRepository, TimerRepository, WorkflowInstanceRepository};
pub use domain::step::{ScheduledTimer, StepRecord, StepState};
pub use domain::workflow_instance::{TriggerId, WorkflowInstance, WorkflowInstanceId, WorkflowStatus};
