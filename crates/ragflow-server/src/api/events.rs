//! Event submission

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::errors::ApiError;
use crate::server::RagflowServer;

/// Body of `POST /v1/events`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEventRequest {
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEventResponse {
    pub ids: Vec<String>,
}

pub async fn send_event(
    State(server): State<Arc<RagflowServer>>,
    body: Result<Json<SendEventRequest>, JsonRejection>,
) -> Result<Json<SendEventResponse>, ApiError> {
    let Json(request) = body?;
    let trigger_id = server.submit_event(&request.name, request.data).await?;
    Ok(Json(SendEventResponse {
        ids: vec![trigger_id.0],
    }))
}
