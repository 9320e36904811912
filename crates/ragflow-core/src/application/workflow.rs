use async_trait::async_trait;
use serde_json::Value;

use crate::application::step_executor::{StepContext, StepError};

/// A durable workflow.
///
/// `execute` is re-entered from the top whenever the instance runs. All side
/// effects must go through the [`StepContext`] so that re-entry replays them
/// instead of repeating them. Returning [`StepError::Suspended`] (usually via
/// `?` on [`StepContext::sleep`]) parks the instance until its timer fires.
#[async_trait]
pub trait Workflow: Send + Sync {
    /// Stable name, recorded on every instance
    fn name(&self) -> &str;

    /// Run the workflow body for one instance
    async fn execute(&self, ctx: &StepContext, payload: &Value) -> Result<Value, StepError>;
}
