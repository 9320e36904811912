//! Run listing and cancellation

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use ragflow_core::RunRecord;

use super::errors::ApiError;
use crate::server::RagflowServer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunsResponse {
    pub data: Vec<RunRecord>,
}

/// `GET /v1/events/:trigger_id/runs`. An unknown trigger has no runs.
pub async fn list_runs(
    State(server): State<Arc<RagflowServer>>,
    Path(trigger_id): Path<String>,
) -> Result<Json<RunsResponse>, ApiError> {
    let data = server.runs_for_trigger(&trigger_id).await?;
    Ok(Json(RunsResponse { data }))
}

pub async fn cancel_run(
    State(server): State<Arc<RagflowServer>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunRecord>, ApiError> {
    Ok(Json(server.cancel_run(&run_id).await?))
}
