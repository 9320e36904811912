//! Workflow runtime: event dispatch, instance tasks and timer-driven resumption.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::clock::Clock;
use crate::application::retry::RetryPolicy;
use crate::application::run_tracker::{RunRecord, RunSource};
use crate::application::step_executor::{StepContext, StepError, StepExecutor};
use crate::application::workflow::Workflow;
use crate::domain::events::DomainEvent;
use crate::domain::repository::{StepRepository, TimerRepository, WorkflowInstanceRepository};
use crate::domain::step::ScheduledTimer;
use crate::domain::workflow_instance::{
    TriggerId, WorkflowInstance, WorkflowInstanceId, WorkflowStatus,
};
use crate::CoreError;

/// Timer that re-enters an instance whose last execution pass errored
pub const EXECUTION_RETRY_TIMER: &str = "execution_retry";

/// How long after a failed execution pass the instance is retried
pub const EXECUTION_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Handler for domain events
#[async_trait]
pub trait DomainEventHandler: Send + Sync {
    /// Handle a domain event
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError>;
}

/// Default handler: writes every lifecycle event to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventHandler;

#[async_trait]
impl DomainEventHandler for LoggingEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        info!(
            event_type = event.event_type(),
            instance_id = %event.instance_id(),
            timestamp = %event.timestamp(),
            "Workflow lifecycle event"
        );
        Ok(())
    }
}

/// Runs workflow instances as independent tasks.
///
/// Cloning is cheap and every clone drives the same set of instances.
#[derive(Clone)]
pub struct WorkflowRuntime {
    instances: Arc<dyn WorkflowInstanceRepository>,
    steps: Arc<dyn StepRepository>,
    timers: Arc<dyn TimerRepository>,
    clock: Arc<dyn Clock>,
    executor: Arc<StepExecutor>,
    event_handler: Arc<dyn DomainEventHandler>,
    workflows: Arc<RwLock<HashMap<String, Vec<Arc<dyn Workflow>>>>>,
    // instance id -> "run again when the current pass ends"
    in_flight: Arc<DashMap<String, bool>>,
    idle: Arc<Notify>,
}

impl WorkflowRuntime {
    /// Create a runtime over the given stores
    pub fn new(
        instances: Arc<dyn WorkflowInstanceRepository>,
        steps: Arc<dyn StepRepository>,
        timers: Arc<dyn TimerRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let executor = Arc::new(StepExecutor::new(
            steps.clone(),
            timers.clone(),
            clock.clone(),
        ));

        Self {
            instances,
            steps,
            timers,
            clock,
            executor,
            event_handler: Arc::new(LoggingEventHandler),
            workflows: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(DashMap::new()),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Runtime backed by the in-memory stores
    #[cfg(feature = "testing")]
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        use crate::domain::repository::memory::{
            MemoryStepRepository, MemoryTimerRepository, MemoryWorkflowInstanceRepository,
        };

        Self::new(
            Arc::new(MemoryWorkflowInstanceRepository::new()),
            Arc::new(MemoryStepRepository::new()),
            Arc::new(MemoryTimerRepository::new()),
            clock,
        )
    }

    /// Use a different retry policy for steps
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.executor = Arc::new(
            StepExecutor::new(self.steps.clone(), self.timers.clone(), self.clock.clone())
                .with_retry_policy(retry_policy),
        );
        self
    }

    /// Send lifecycle events to a different handler
    pub fn with_event_handler(mut self, event_handler: Arc<dyn DomainEventHandler>) -> Self {
        self.event_handler = event_handler;
        self
    }

    /// The clock used for deadlines
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Subscribe a workflow to an event
    pub fn register(&self, event_name: &str, workflow: Arc<dyn Workflow>) {
        info!(event = event_name, workflow = workflow.name(), "Registering workflow");
        self.workflows
            .write()
            .entry(event_name.to_string())
            .or_default()
            .push(workflow);
    }

    /// Names of the events with at least one subscriber
    pub fn registered_events(&self) -> Vec<String> {
        let mut events: Vec<String> = self.workflows.read().keys().cloned().collect();
        events.sort();
        events
    }

    /// Start one instance per workflow subscribed to `event_name`
    pub async fn submit(&self, event_name: &str, payload: Value) -> Result<TriggerId, CoreError> {
        let workflows = self
            .workflows
            .read()
            .get(event_name)
            .cloned()
            .unwrap_or_default();
        if workflows.is_empty() {
            return Err(CoreError::WorkflowNotFound(format!(
                "No workflow registered for event '{}'",
                event_name
            )));
        }

        let trigger_id = TriggerId::new_v4();
        for workflow in workflows {
            let mut instance = WorkflowInstance::new(
                workflow.name(),
                trigger_id.clone(),
                event_name,
                payload.clone(),
                self.clock.now(),
            );
            self.instances.save(&instance).await?;
            self.handle_events(&mut instance).await?;

            debug!(
                trigger_id = %trigger_id,
                instance_id = %instance.id,
                workflow = workflow.name(),
                "Instance created"
            );
            self.schedule(instance.id.clone());
        }

        Ok(trigger_id)
    }

    /// Runs started by a trigger, oldest first
    pub async fn runs_for_trigger(&self, trigger_id: &TriggerId) -> Result<Vec<RunRecord>, CoreError> {
        let instances = self.instances.find_by_trigger(trigger_id).await?;
        Ok(instances.iter().map(RunRecord::from).collect())
    }

    /// Load one instance
    pub async fn get_instance(
        &self,
        instance_id: &WorkflowInstanceId,
    ) -> Result<WorkflowInstance, CoreError> {
        self.instances
            .find_by_id(instance_id)
            .await?
            .ok_or_else(|| CoreError::InstanceNotFound(instance_id.0.clone()))
    }

    /// Re-enter a running instance
    pub async fn resume(&self, instance_id: &WorkflowInstanceId) -> Result<(), CoreError> {
        let instance = self.get_instance(instance_id).await?;
        if instance.status.is_terminal() {
            debug!(instance_id = %instance_id, status = %instance.status, "Not resuming finished instance");
            return Ok(());
        }

        self.schedule(instance.id);
        Ok(())
    }

    /// Resume every instance whose timer is due. Returns the number of timers claimed.
    pub async fn process_due_timers(&self) -> Result<usize, CoreError> {
        let due = self.timers.claim_due(self.clock.now()).await?;
        let count = due.len();

        for timer in due {
            debug!(
                instance_id = %timer.instance_id,
                step = %timer.step_name,
                wake_at = %timer.wake_at,
                "Timer fired"
            );
            match self.resume(&timer.instance_id).await {
                Ok(()) => {}
                Err(CoreError::InstanceNotFound(_)) => {
                    warn!(instance_id = %timer.instance_id, "Dropping timer of unknown instance");
                }
                Err(e) => {
                    // The claim already removed the timer; put it back so a later pass retries
                    warn!(instance_id = %timer.instance_id, error = %e, "Could not resume instance from timer");
                    if let Err(e) = self.timers.schedule(&timer).await {
                        error!(instance_id = %timer.instance_id, error = %e, "Could not restore timer");
                    }
                }
            }
        }

        Ok(count)
    }

    async fn schedule_execution_retry(&self, instance_id: &WorkflowInstanceId) -> Result<(), CoreError> {
        let delay = chrono::Duration::from_std(EXECUTION_RETRY_DELAY)
            .map_err(|e| CoreError::TimerError(e.to_string()))?;
        let timer = ScheduledTimer::new(
            instance_id.clone(),
            EXECUTION_RETRY_TIMER,
            self.clock.now() + delay,
        );
        self.timers.schedule(&timer).await
    }

    /// Poll for due timers in the background
    pub fn start_timer_processing(&self, interval: Duration) -> JoinHandle<()> {
        let runtime = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let Err(e) = runtime.process_due_timers().await {
                    error!(error = %e, "Timer processing failed");
                }
            }
        })
    }

    /// Re-enter every running instance, e.g. after a restart. Returns how many were resumed.
    pub async fn recover(&self) -> Result<usize, CoreError> {
        let running = self
            .instances
            .list_instances(Some(WorkflowStatus::Running))
            .await?;
        let count = running.len();

        for instance in running {
            self.schedule(instance.id);
        }

        if count > 0 {
            info!(count, "Recovered running instances");
        }
        Ok(count)
    }

    /// Cancel an instance and drop its timers
    pub async fn cancel(&self, instance_id: &WorkflowInstanceId) -> Result<WorkflowInstance, CoreError> {
        let mut instance = self.get_instance(instance_id).await?;
        instance.cancel(self.clock.now())?;

        self.instances.save(&instance).await?;
        self.timers.cancel_for_instance(instance_id).await?;
        self.handle_events(&mut instance).await?;

        info!(instance_id = %instance_id, "Instance cancelled");
        Ok(instance)
    }

    /// Wait until no instance task is running
    pub async fn settle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight.is_empty() {
                return;
            }
            notified.await;
        }
    }

    fn schedule(&self, instance_id: WorkflowInstanceId) {
        match self.in_flight.entry(instance_id.0.clone()) {
            Entry::Occupied(mut running) => {
                *running.get_mut() = true;
                return;
            }
            Entry::Vacant(slot) => {
                slot.insert(false);
            }
        }

        let runtime = self.clone();
        tokio::spawn(async move {
            loop {
                match runtime.execute_instance(&instance_id).await {
                    Ok(()) => {}
                    Err(CoreError::InstanceNotFound(_)) => {
                        warn!(instance_id = %instance_id, "Instance disappeared before execution");
                    }
                    Err(e) => {
                        error!(instance_id = %instance_id, error = %e, "Instance execution error");
                        if let Err(e) = runtime.schedule_execution_retry(&instance_id).await {
                            error!(instance_id = %instance_id, error = %e, "Could not schedule execution retry");
                        }
                    }
                }

                if runtime
                    .in_flight
                    .remove_if(&instance_id.0, |_, rerun| !*rerun)
                    .is_some()
                {
                    break;
                }
                if let Some(mut rerun) = runtime.in_flight.get_mut(&instance_id.0) {
                    *rerun = false;
                }
            }

            runtime.idle.notify_waiters();
        });
    }

    fn find_workflow(&self, event_name: &str, workflow_name: &str) -> Option<Arc<dyn Workflow>> {
        self.workflows
            .read()
            .get(event_name)?
            .iter()
            .find(|workflow| workflow.name() == workflow_name)
            .cloned()
    }

    async fn execute_instance(&self, instance_id: &WorkflowInstanceId) -> Result<(), CoreError> {
        let instance = self.get_instance(instance_id).await?;
        if instance.status.is_terminal() {
            return Ok(());
        }

        let result = match self.find_workflow(&instance.event_name, &instance.workflow) {
            Some(workflow) => {
                let ctx = StepContext::new(self.executor.clone(), instance_id.clone());
                workflow.execute(&ctx, &instance.trigger_data).await
            }
            None => Err(StepError::Core(CoreError::WorkflowNotFound(format!(
                "Workflow '{}' is not registered for event '{}'",
                instance.workflow, instance.event_name
            )))),
        };

        // Cancellation may have landed while the workflow was running
        let mut current = self.get_instance(instance_id).await?;
        if current.status.is_terminal() {
            warn!(
                instance_id = %instance_id,
                status = %current.status,
                "Instance finished elsewhere while executing; discarding result"
            );
            return Ok(());
        }

        let now = self.clock.now();
        match result {
            Ok(output) => current.complete(output, now)?,
            Err(StepError::Suspended { step, wake_at }) => {
                debug!(instance_id = %instance_id, step = %step, %wake_at, "Instance suspended");
                current.suspend(&step, wake_at, now)?;
            }
            Err(err) => {
                error!(instance_id = %instance_id, workflow = %current.workflow, error = %err, "Instance failed");
                current.fail(err.to_string(), now)?;
            }
        }

        self.instances.save(&current).await?;
        self.handle_events(&mut current).await
    }

    async fn handle_events(&self, instance: &mut WorkflowInstance) -> Result<(), CoreError> {
        for event in instance.take_events() {
            self.event_handler.handle_event(event).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RunSource for WorkflowRuntime {
    async fn submit(&self, event_name: &str, payload: Value) -> Result<TriggerId, CoreError> {
        WorkflowRuntime::submit(self, event_name, payload).await
    }

    async fn runs(&self, trigger_id: &TriggerId) -> Result<Vec<RunRecord>, CoreError> {
        self.runs_for_trigger(trigger_id).await
    }
}
