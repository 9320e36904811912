//! Memoized step execution and durable waits.
//!
//! A workflow is an ordinary async function that is re-entered from the top
//! every time its instance runs: on first submission, after a durable wait
//! elapses and after a process restart. Each side-effecting piece of work is
//! wrapped in [`StepExecutor::run`], which looks the step up in the step log
//! before executing it. A completed step is never executed again for the same
//! instance; its persisted output is returned instead.
//!
//! [`StepExecutor::sleep_until`] persists a deadline on first use and yields
//! [`StepError::Suspended`] until the clock passes it. The runtime treats the
//! suspension as "stop here, a timer will bring us back".

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::application::clock::Clock;
use crate::application::retry::RetryPolicy;
use crate::domain::repository::{StepRepository, TimerRepository};
use crate::domain::step::{ScheduledTimer, StepRecord, StepState};
use crate::domain::workflow_instance::WorkflowInstanceId;
use crate::CoreError;

/// Outcome of a step other than success
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    /// The instance yielded at a durable wait and must be resumed later
    #[error("Workflow suspended at step '{step}' until {wake_at}")]
    Suspended {
        /// Sleep step that suspended
        step: String,
        /// Persisted deadline
        wake_at: DateTime<Utc>,
    },

    /// The step gave up; the instance must fail
    #[error("Step '{step}' failed after {attempts} attempt(s): {message}")]
    Failed {
        /// Failed step
        step: String,
        /// Attempts made
        attempts: u32,
        /// Error of the last attempt
        message: String,
    },

    /// Bookkeeping failed (step log, timers, serialization)
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl StepError {
    /// Whether this is a suspension rather than a failure
    pub fn is_suspension(&self) -> bool {
        matches!(self, StepError::Suspended { .. })
    }
}

/// Runs named steps for workflow instances against the step log
pub struct StepExecutor {
    steps: Arc<dyn StepRepository>,
    timers: Arc<dyn TimerRepository>,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
}

impl StepExecutor {
    /// Create an executor with the default retry policy
    pub fn new(
        steps: Arc<dyn StepRepository>,
        timers: Arc<dyn TimerRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            steps,
            timers,
            clock,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// The clock deadlines are measured against
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Execute `action` once per (instance, step) and return its output.
    ///
    /// Later calls for the same pair return the persisted output without
    /// calling `action`. Transient errors are retried according to the retry
    /// policy; the attempt counter is persisted before every attempt so a
    /// restart does not reset the budget.
    pub async fn run<T, F, Fut>(
        &self,
        instance_id: &WorkflowInstanceId,
        step_name: &str,
        mut action: F,
    ) -> Result<T, StepError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, CoreError>> + Send,
    {
        let previous_attempts = match self.steps.get_step(instance_id, step_name).await? {
            Some(StepRecord {
                state: StepState::Completed { output },
                ..
            }) => {
                debug!(instance_id = %instance_id, step = step_name, "Replaying memoized step output");
                return serde_json::from_value(output)
                    .map_err(|e| StepError::Core(CoreError::from(e)));
            }
            Some(StepRecord {
                state: StepState::Failed { error, attempts },
                ..
            }) => {
                return Err(StepError::Failed {
                    step: step_name.to_string(),
                    attempts,
                    message: error,
                });
            }
            Some(StepRecord {
                state: StepState::Pending { attempts, .. },
                ..
            }) => attempts,
            None => 0,
        };

        let max_attempts = self.retry_policy.max_attempts.max(1);
        if previous_attempts >= max_attempts {
            let message = format!(
                "retry budget of {} attempts exhausted before the step could finish",
                max_attempts
            );
            return self
                .record_failure(instance_id, step_name, message, previous_attempts)
                .await;
        }

        let mut attempt = previous_attempts;
        loop {
            attempt += 1;
            self.steps
                .save_step(instance_id, &StepRecord::pending(step_name, attempt))
                .await?;
            debug!(instance_id = %instance_id, step = step_name, attempt, "Executing step");

            match action().await {
                Ok(output) => {
                    let value = serde_json::to_value(&output).map_err(CoreError::from)?;
                    self.steps
                        .save_step(
                            instance_id,
                            &StepRecord::completed(step_name, value, self.clock.now()),
                        )
                        .await?;
                    debug!(instance_id = %instance_id, step = step_name, attempt, "Step completed");
                    return Ok(output);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.retry_policy.delay_for(attempt);
                    warn!(
                        instance_id = %instance_id,
                        step = step_name,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient step failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return self
                        .record_failure(instance_id, step_name, err.to_string(), attempt)
                        .await;
                }
            }
        }
    }

    async fn record_failure<T>(
        &self,
        instance_id: &WorkflowInstanceId,
        step_name: &str,
        message: String,
        attempts: u32,
    ) -> Result<T, StepError> {
        error!(
            instance_id = %instance_id,
            step = step_name,
            attempts,
            error = %message,
            "Step failed permanently"
        );
        self.steps
            .save_step(
                instance_id,
                &StepRecord::failed(step_name, message.clone(), attempts, self.clock.now()),
            )
            .await?;

        Err(StepError::Failed {
            step: step_name.to_string(),
            attempts,
            message,
        })
    }

    /// Durable wait of `duration`, measured from the first call for this step.
    ///
    /// The deadline is persisted on first call. Every later call compares the
    /// clock against that persisted deadline: once it has passed the step is
    /// recorded as completed and `Ok(())` is returned; before that a timer is
    /// (re)scheduled and [`StepError::Suspended`] is returned.
    pub async fn sleep_until(
        &self,
        instance_id: &WorkflowInstanceId,
        step_name: &str,
        duration: Duration,
    ) -> Result<(), StepError> {
        let now = self.clock.now();

        let wake_at = match self.steps.get_step(instance_id, step_name).await? {
            Some(StepRecord {
                state: StepState::Completed { .. },
                ..
            }) => return Ok(()),
            Some(StepRecord {
                state: StepState::Failed { error, attempts },
                ..
            }) => {
                return Err(StepError::Failed {
                    step: step_name.to_string(),
                    attempts,
                    message: error,
                })
            }
            Some(StepRecord {
                state: StepState::Pending {
                    wake_at: Some(wake_at),
                    ..
                },
                ..
            }) => wake_at,
            _ => {
                let delay = chrono::Duration::from_std(duration).map_err(|e| {
                    CoreError::TimerError(format!(
                        "Invalid wait duration for step '{}': {}",
                        step_name, e
                    ))
                })?;
                let wake_at = now.checked_add_signed(delay).ok_or_else(|| {
                    CoreError::TimerError(format!(
                        "Wait of step '{}' ends past the supported time range",
                        step_name
                    ))
                })?;
                self.steps
                    .save_step(instance_id, &StepRecord::sleeping(step_name, wake_at))
                    .await?;
                debug!(instance_id = %instance_id, step = step_name, %wake_at, "Durable wait started");
                wake_at
            }
        };

        if now >= wake_at {
            self.steps
                .save_step(
                    instance_id,
                    &StepRecord::completed(step_name, Value::Null, now),
                )
                .await?;
            debug!(instance_id = %instance_id, step = step_name, "Durable wait elapsed");
            return Ok(());
        }

        self.timers
            .schedule(&ScheduledTimer::new(instance_id.clone(), step_name, wake_at))
            .await?;

        Err(StepError::Suspended {
            step: step_name.to_string(),
            wake_at,
        })
    }
}

/// Step API handed to a workflow for one instance
#[derive(Clone)]
pub struct StepContext {
    executor: Arc<StepExecutor>,
    instance_id: WorkflowInstanceId,
}

impl StepContext {
    /// Bind an executor to an instance
    pub fn new(executor: Arc<StepExecutor>, instance_id: WorkflowInstanceId) -> Self {
        Self {
            executor,
            instance_id,
        }
    }

    /// The instance this context belongs to
    pub fn instance_id(&self) -> &WorkflowInstanceId {
        &self.instance_id
    }

    /// See [`StepExecutor::run`]
    pub async fn run<T, F, Fut>(&self, step_name: &str, action: F) -> Result<T, StepError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, CoreError>> + Send,
    {
        self.executor.run(&self.instance_id, step_name, action).await
    }

    /// See [`StepExecutor::sleep_until`]
    pub async fn sleep(&self, step_name: &str, duration: Duration) -> Result<(), StepError> {
        self.executor
            .sleep_until(&self.instance_id, step_name, duration)
            .await
    }
}
