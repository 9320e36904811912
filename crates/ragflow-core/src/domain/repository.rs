//! Repository traits for the RAGFlow core
//!
//! This module defines the persistence seams used by the step executor and
//! the workflow runtime. External crates implement these traits to provide
//! durable storage; the `memory` module holds the in-process versions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::step::{ScheduledTimer, StepRecord};
use super::workflow_instance::{TriggerId, WorkflowInstance, WorkflowInstanceId, WorkflowStatus};
use crate::CoreError;

/// Repository for workflow instances
#[async_trait]
pub trait WorkflowInstanceRepository: Send + Sync {
    /// Find a workflow instance by ID
    async fn find_by_id(&self, id: &WorkflowInstanceId)
        -> Result<Option<WorkflowInstance>, CoreError>;

    /// Insert or overwrite a workflow instance
    async fn save(&self, instance: &WorkflowInstance) -> Result<(), CoreError>;

    /// All instances started by one trigger, oldest first
    async fn find_by_trigger(&self, trigger_id: &TriggerId)
        -> Result<Vec<WorkflowInstance>, CoreError>;

    /// List workflow instances, optionally filtered by status
    async fn list_instances(
        &self,
        status: Option<WorkflowStatus>,
    ) -> Result<Vec<WorkflowInstance>, CoreError>;
}

/// The step log: (instance, step name) -> step state
#[async_trait]
pub trait StepRepository: Send + Sync {
    /// Look up the record of a step
    async fn get_step(
        &self,
        instance_id: &WorkflowInstanceId,
        step_name: &str,
    ) -> Result<Option<StepRecord>, CoreError>;

    /// Insert or advance the record of a step
    async fn save_step(
        &self,
        instance_id: &WorkflowInstanceId,
        record: &StepRecord,
    ) -> Result<(), CoreError>;

    /// All step records of an instance in the order they were first written
    async fn list_steps(&self, instance_id: &WorkflowInstanceId)
        -> Result<Vec<StepRecord>, CoreError>;
}

/// Persisted wake-ups for suspended instances
#[async_trait]
pub trait TimerRepository: Send + Sync {
    /// Schedule a timer; a timer with the same id is replaced
    async fn schedule(&self, timer: &ScheduledTimer) -> Result<(), CoreError>;

    /// Drop every timer of an instance
    async fn cancel_for_instance(&self, instance_id: &WorkflowInstanceId) -> Result<(), CoreError>;

    /// Remove and return the timers due at `now`. A timer is handed out at most once.
    async fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTimer>, CoreError>;

    /// Timers not yet claimed
    async fn list_pending(&self) -> Result<Vec<ScheduledTimer>, CoreError>;
}

/// Memory implementations for testing and local mode
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use dashmap::DashMap;
    use std::sync::Arc;

    /// In-memory workflow instance repository using concurrent maps
    pub struct MemoryWorkflowInstanceRepository {
        instances: Arc<DashMap<String, WorkflowInstance>>,
        triggers: Arc<DashMap<String, Vec<String>>>,
    }

    impl MemoryWorkflowInstanceRepository {
        /// Create a new memory workflow instance repository
        pub fn new() -> Self {
            Self {
                instances: Arc::new(DashMap::with_capacity(64)),
                triggers: Arc::new(DashMap::with_capacity(64)),
            }
        }
    }

    impl Default for MemoryWorkflowInstanceRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl WorkflowInstanceRepository for MemoryWorkflowInstanceRepository {
        async fn find_by_id(
            &self,
            id: &WorkflowInstanceId,
        ) -> Result<Option<WorkflowInstance>, CoreError> {
            Ok(self.instances.get(&id.0).map(|instance| instance.clone()))
        }

        async fn save(&self, instance: &WorkflowInstance) -> Result<(), CoreError> {
            self.instances.insert(instance.id.0.clone(), instance.clone());

            let mut ids = self
                .triggers
                .entry(instance.trigger_id.0.clone())
                .or_default();
            if !ids.contains(&instance.id.0) {
                ids.push(instance.id.0.clone());
            }

            Ok(())
        }

        async fn find_by_trigger(
            &self,
            trigger_id: &TriggerId,
        ) -> Result<Vec<WorkflowInstance>, CoreError> {
            let ids = match self.triggers.get(&trigger_id.0) {
                Some(ids) => ids.clone(),
                None => return Ok(Vec::new()),
            };

            Ok(ids
                .iter()
                .filter_map(|id| self.instances.get(id).map(|instance| instance.clone()))
                .collect())
        }

        async fn list_instances(
            &self,
            status: Option<WorkflowStatus>,
        ) -> Result<Vec<WorkflowInstance>, CoreError> {
            let mut result: Vec<WorkflowInstance> = self
                .instances
                .iter()
                .filter(|instance| status.map_or(true, |s| instance.status == s))
                .map(|instance| instance.clone())
                .collect();
            result.sort_by_key(|instance| instance.created_at);
            Ok(result)
        }
    }

    /// In-memory step log
    pub struct MemoryStepRepository {
        steps: Arc<DashMap<String, Vec<StepRecord>>>,
    }

    impl MemoryStepRepository {
        /// Create a new memory step repository
        pub fn new() -> Self {
            Self {
                steps: Arc::new(DashMap::with_capacity(64)),
            }
        }
    }

    impl Default for MemoryStepRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl StepRepository for MemoryStepRepository {
        async fn get_step(
            &self,
            instance_id: &WorkflowInstanceId,
            step_name: &str,
        ) -> Result<Option<StepRecord>, CoreError> {
            Ok(self.steps.get(&instance_id.0).and_then(|records| {
                records
                    .iter()
                    .find(|record| record.step_name == step_name)
                    .cloned()
            }))
        }

        async fn save_step(
            &self,
            instance_id: &WorkflowInstanceId,
            record: &StepRecord,
        ) -> Result<(), CoreError> {
            let mut records = self.steps.entry(instance_id.0.clone()).or_default();
            match records
                .iter_mut()
                .find(|existing| existing.step_name == record.step_name)
            {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
            Ok(())
        }

        async fn list_steps(
            &self,
            instance_id: &WorkflowInstanceId,
        ) -> Result<Vec<StepRecord>, CoreError> {
            Ok(self
                .steps
                .get(&instance_id.0)
                .map(|records| records.clone())
                .unwrap_or_default())
        }
    }

    /// In-memory timer repository. Timers are claimed by the runtime's timer loop.
    pub struct MemoryTimerRepository {
        timers: Arc<DashMap<String, ScheduledTimer>>,
    }

    impl MemoryTimerRepository {
        /// Create a new memory timer repository
        pub fn new() -> Self {
            Self {
                timers: Arc::new(DashMap::with_capacity(32)),
            }
        }
    }

    impl Default for MemoryTimerRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl TimerRepository for MemoryTimerRepository {
        async fn schedule(&self, timer: &ScheduledTimer) -> Result<(), CoreError> {
            self.timers.insert(timer.timer_id.clone(), timer.clone());
            Ok(())
        }

        async fn cancel_for_instance(
            &self,
            instance_id: &WorkflowInstanceId,
        ) -> Result<(), CoreError> {
            self.timers
                .retain(|_, timer| timer.instance_id != *instance_id);
            Ok(())
        }

        async fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTimer>, CoreError> {
            let due: Vec<String> = self
                .timers
                .iter()
                .filter(|timer| timer.wake_at <= now)
                .map(|timer| timer.timer_id.clone())
                .collect();

            // remove() hands each timer to exactly one caller
            let mut claimed: Vec<ScheduledTimer> = due
                .into_iter()
                .filter_map(|id| self.timers.remove(&id).map(|(_, timer)| timer))
                .collect();
            claimed.sort_by_key(|timer| timer.wake_at);

            Ok(claimed)
        }

        async fn list_pending(&self) -> Result<Vec<ScheduledTimer>, CoreError> {
            let mut pending: Vec<ScheduledTimer> =
                self.timers.iter().map(|timer| timer.clone()).collect();
            pending.sort_by_key(|timer| timer.wake_at);
            Ok(pending)
        }
    }

}
