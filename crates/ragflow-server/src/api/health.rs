//! Health check endpoint

use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::server::RagflowServer;

/// Health check handler
pub async fn health_check(State(server): State<Arc<RagflowServer>>) -> Json<Value> {
    debug!("Health check requested");

    Json(json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION"),
        "events": server.runtime().registered_events(),
    }))
}
