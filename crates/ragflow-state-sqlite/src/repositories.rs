use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragflow_core::{
    domain::repository::{StepRepository, TimerRepository, WorkflowInstanceRepository},
    domain::step::{ScheduledTimer, StepRecord, StepState},
    domain::workflow_instance::{TriggerId, WorkflowInstance, WorkflowInstanceId, WorkflowStatus},
    CoreError,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use crate::connection::SqliteConnection;

fn store_error(context: &str, e: sqlx::Error) -> CoreError {
    CoreError::StateStoreError(format!("{}: {}", context, e))
}

fn instance_from_row(row: &SqliteRow) -> Result<WorkflowInstance, CoreError> {
    let data: String = row
        .try_get("data")
        .map_err(|e| CoreError::SerializationError(format!("Error getting data: {}", e)))?;

    serde_json::from_str(&data).map_err(|e| {
        CoreError::SerializationError(format!("Error deserializing workflow instance: {}", e))
    })
}

fn instances_from_rows(rows: &[SqliteRow]) -> Result<Vec<WorkflowInstance>, CoreError> {
    rows.iter().map(instance_from_row).collect()
}

// Rounded up so that a claimed timer is never early
fn wake_at_millis(wake_at: DateTime<Utc>) -> i64 {
    let millis = wake_at.timestamp_millis();
    if wake_at.timestamp_subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis + 1
    }
}

/// SQLite implementation of the WorkflowInstanceRepository
#[derive(Clone)]
pub struct SqliteWorkflowInstanceRepository {
    conn: SqliteConnection,
}

impl SqliteWorkflowInstanceRepository {
    /// Create a new SQLite workflow instance repository
    pub fn new(conn: SqliteConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl WorkflowInstanceRepository for SqliteWorkflowInstanceRepository {
    async fn find_by_id(
        &self,
        id: &WorkflowInstanceId,
    ) -> Result<Option<WorkflowInstance>, CoreError> {
        let row = sqlx::query("SELECT data FROM workflow_instances WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(self.conn.pool())
            .await
            .map_err(|e| store_error("Failed to load workflow instance", e))?;

        row.as_ref().map(instance_from_row).transpose()
    }

    async fn save(&self, instance: &WorkflowInstance) -> Result<(), CoreError> {
        let data = serde_json::to_string(instance).map_err(|e| {
            CoreError::SerializationError(format!("Error serializing workflow instance: {}", e))
        })?;

        let query = "
            INSERT INTO workflow_instances (id, workflow, trigger_id, status, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                workflow = excluded.workflow,
                status = excluded.status,
                data = excluded.data,
                updated_at = excluded.updated_at
        ";

        sqlx::query(query)
            .bind(&instance.id.0)
            .bind(&instance.workflow)
            .bind(&instance.trigger_id.0)
            .bind(instance.status.as_str())
            .bind(&data)
            .bind(instance.created_at)
            .bind(instance.updated_at)
            .execute(self.conn.pool())
            .await
            .map_err(|e| store_error("Failed to save workflow instance", e))?;

        debug!(instance_id = %instance.id, status = %instance.status, "Workflow instance saved");
        Ok(())
    }

    async fn find_by_trigger(
        &self,
        trigger_id: &TriggerId,
    ) -> Result<Vec<WorkflowInstance>, CoreError> {
        let rows = sqlx::query(
            "SELECT data FROM workflow_instances WHERE trigger_id = ? ORDER BY created_at, rowid",
        )
        .bind(&trigger_id.0)
        .fetch_all(self.conn.pool())
        .await
        .map_err(|e| store_error("Failed to load runs for trigger", e))?;

        instances_from_rows(&rows)
    }

    async fn list_instances(
        &self,
        status: Option<WorkflowStatus>,
    ) -> Result<Vec<WorkflowInstance>, CoreError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT data FROM workflow_instances WHERE status = ? ORDER BY created_at, rowid",
                )
                .bind(status.as_str())
                .fetch_all(self.conn.pool())
                .await
            }
            None => {
                sqlx::query("SELECT data FROM workflow_instances ORDER BY created_at, rowid")
                    .fetch_all(self.conn.pool())
                    .await
            }
        }
        .map_err(|e| store_error("Failed to list workflow instances", e))?;

        instances_from_rows(&rows)
    }
}

/// SQLite step log
#[derive(Clone)]
pub struct SqliteStepRepository {
    conn: SqliteConnection,
}

impl SqliteStepRepository {
    /// Create a new SQLite step repository
    pub fn new(conn: SqliteConnection) -> Self {
        Self { conn }
    }

    fn record_from_row(row: &SqliteRow) -> Result<StepRecord, CoreError> {
        let step_name: String = row
            .try_get("step_name")
            .map_err(|e| CoreError::SerializationError(format!("Error getting step_name: {}", e)))?;
        let state: String = row
            .try_get("state")
            .map_err(|e| CoreError::SerializationError(format!("Error getting state: {}", e)))?;
        let completed_at: Option<DateTime<Utc>> = row.try_get("completed_at").map_err(|e| {
            CoreError::SerializationError(format!("Error getting completed_at: {}", e))
        })?;

        let state: StepState = serde_json::from_str(&state).map_err(|e| {
            CoreError::SerializationError(format!("Error deserializing step state: {}", e))
        })?;

        Ok(StepRecord {
            step_name,
            state,
            completed_at,
        })
    }
}

#[async_trait]
impl StepRepository for SqliteStepRepository {
    async fn get_step(
        &self,
        instance_id: &WorkflowInstanceId,
        step_name: &str,
    ) -> Result<Option<StepRecord>, CoreError> {
        let row = sqlx::query(
            "SELECT step_name, state, completed_at FROM step_records WHERE instance_id = ? AND step_name = ?",
        )
        .bind(&instance_id.0)
        .bind(step_name)
        .fetch_optional(self.conn.pool())
        .await
        .map_err(|e| store_error("Failed to load step record", e))?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn save_step(
        &self,
        instance_id: &WorkflowInstanceId,
        record: &StepRecord,
    ) -> Result<(), CoreError> {
        let state = serde_json::to_string(&record.state).map_err(|e| {
            CoreError::SerializationError(format!("Error serializing step state: {}", e))
        })?;

        // seq keeps the order in which steps were first written
        let query = "
            INSERT INTO step_records (instance_id, step_name, seq, state, completed_at)
            VALUES (
                ?1,
                ?2,
                (SELECT COALESCE(MAX(seq), 0) + 1 FROM step_records WHERE instance_id = ?1),
                ?3,
                ?4
            )
            ON CONFLICT (instance_id, step_name) DO UPDATE SET
                state = excluded.state,
                completed_at = excluded.completed_at
        ";

        sqlx::query(query)
            .bind(&instance_id.0)
            .bind(&record.step_name)
            .bind(&state)
            .bind(record.completed_at)
            .execute(self.conn.pool())
            .await
            .map_err(|e| store_error("Failed to save step record", e))?;

        Ok(())
    }

    async fn list_steps(
        &self,
        instance_id: &WorkflowInstanceId,
    ) -> Result<Vec<StepRecord>, CoreError> {
        let rows = sqlx::query(
            "SELECT step_name, state, completed_at FROM step_records WHERE instance_id = ? ORDER BY seq",
        )
        .bind(&instance_id.0)
        .fetch_all(self.conn.pool())
        .await
        .map_err(|e| store_error("Failed to list step records", e))?;

        rows.iter().map(Self::record_from_row).collect()
    }
}

/// SQLite timer repository
#[derive(Clone)]
pub struct SqliteTimerRepository {
    conn: SqliteConnection,
}

impl SqliteTimerRepository {
    /// Create a new SQLite timer repository
    pub fn new(conn: SqliteConnection) -> Self {
        Self { conn }
    }

    fn timer_from_row(row: &SqliteRow) -> Result<ScheduledTimer, CoreError> {
        let get_error = |e: sqlx::Error| CoreError::SerializationError(format!("Error reading timer: {}", e));

        Ok(ScheduledTimer {
            timer_id: row.try_get("timer_id").map_err(get_error)?,
            instance_id: WorkflowInstanceId(row.try_get("instance_id").map_err(get_error)?),
            step_name: row.try_get("step_name").map_err(get_error)?,
            wake_at: row.try_get("wake_at").map_err(get_error)?,
        })
    }
}

#[async_trait]
impl TimerRepository for SqliteTimerRepository {
    async fn schedule(&self, timer: &ScheduledTimer) -> Result<(), CoreError> {
        let query = "
            INSERT INTO timers (timer_id, instance_id, step_name, wake_at, wake_at_ms)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (timer_id) DO UPDATE SET
                instance_id = excluded.instance_id,
                step_name = excluded.step_name,
                wake_at = excluded.wake_at,
                wake_at_ms = excluded.wake_at_ms
        ";

        sqlx::query(query)
            .bind(&timer.timer_id)
            .bind(&timer.instance_id.0)
            .bind(&timer.step_name)
            .bind(timer.wake_at)
            .bind(wake_at_millis(timer.wake_at))
            .execute(self.conn.pool())
            .await
            .map_err(|e| store_error("Failed to schedule timer", e))?;

        debug!(timer_id = %timer.timer_id, wake_at = %timer.wake_at, "Timer scheduled");
        Ok(())
    }

    async fn cancel_for_instance(&self, instance_id: &WorkflowInstanceId) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM timers WHERE instance_id = ?")
            .bind(&instance_id.0)
            .execute(self.conn.pool())
            .await
            .map_err(|e| store_error("Failed to cancel timers", e))?;
        Ok(())
    }

    async fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTimer>, CoreError> {
        // DELETE ... RETURNING hands each timer to exactly one caller
        let rows = sqlx::query(
            "DELETE FROM timers WHERE wake_at_ms <= ? RETURNING timer_id, instance_id, step_name, wake_at",
        )
        .bind(now.timestamp_millis())
        .fetch_all(self.conn.pool())
        .await
        .map_err(|e| store_error("Failed to claim due timers", e))?;

        let mut claimed = rows
            .iter()
            .map(Self::timer_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        claimed.sort_by_key(|timer| timer.wake_at);
        Ok(claimed)
    }

    async fn list_pending(&self) -> Result<Vec<ScheduledTimer>, CoreError> {
        let rows = sqlx::query(
            "SELECT timer_id, instance_id, step_name, wake_at FROM timers ORDER BY wake_at_ms",
        )
        .fetch_all(self.conn.pool())
        .await
        .map_err(|e| store_error("Failed to list timers", e))?;

        rows.iter().map(Self::timer_from_row).collect()
    }
}
