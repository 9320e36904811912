use crate::domain::workflow_instance::WorkflowInstanceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Persisted state of one named step of one workflow instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StepState {
    /// Started but not finished. For sleep steps `wake_at` holds the persisted deadline.
    Pending {
        /// Attempts started so far
        attempts: u32,
        /// Deadline of a durable wait
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wake_at: Option<DateTime<Utc>>,
    },

    /// Finished; the memoized output
    Completed {
        /// Serialized step output
        output: Value,
    },

    /// Permanently failed
    Failed {
        /// Failure detail of the last attempt
        error: String,
        /// Attempts made before giving up
        attempts: u32,
    },
}

/// Entry in the append-only step log of an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step name, unique within the instance
    pub step_name: String,

    /// Current state
    pub state: StepState,

    /// Set once the step reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    /// Record for an attempt about to start
    pub fn pending(step_name: impl Into<String>, attempts: u32) -> Self {
        Self {
            step_name: step_name.into(),
            state: StepState::Pending {
                attempts,
                wake_at: None,
            },
            completed_at: None,
        }
    }

    /// Record for a durable wait with its deadline
    pub fn sleeping(step_name: impl Into<String>, wake_at: DateTime<Utc>) -> Self {
        Self {
            step_name: step_name.into(),
            state: StepState::Pending {
                attempts: 1,
                wake_at: Some(wake_at),
            },
            completed_at: None,
        }
    }

    /// Record holding a memoized output
    pub fn completed(step_name: impl Into<String>, output: Value, now: DateTime<Utc>) -> Self {
        Self {
            step_name: step_name.into(),
            state: StepState::Completed { output },
            completed_at: Some(now),
        }
    }

    /// Record for a step that gave up
    pub fn failed(
        step_name: impl Into<String>,
        error: impl Into<String>,
        attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            state: StepState::Failed {
                error: error.into(),
                attempts,
            },
            completed_at: Some(now),
        }
    }

    /// Completed or Failed
    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, StepState::Pending { .. })
    }
}

/// Persisted wake-up of a suspended instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTimer {
    /// Timer id, derived from instance and step
    pub timer_id: String,

    /// Instance to resume
    pub instance_id: WorkflowInstanceId,

    /// Sleep step that scheduled the timer
    pub step_name: String,

    /// Earliest time the instance may resume
    pub wake_at: DateTime<Utc>,
}

impl ScheduledTimer {
    /// Create a timer; scheduling the same (instance, step) twice yields the same id
    pub fn new(
        instance_id: WorkflowInstanceId,
        step_name: impl Into<String>,
        wake_at: DateTime<Utc>,
    ) -> Self {
        let step_name = step_name.into();
        Self {
            timer_id: Self::id_for(&instance_id, &step_name),
            instance_id,
            step_name,
            wake_at,
        }
    }

    /// Timer id for an (instance, step) pair
    pub fn id_for(instance_id: &WorkflowInstanceId, step_name: &str) -> String {
        format!("{}:{}", instance_id.0, step_name)
    }
}
