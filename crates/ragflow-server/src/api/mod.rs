//! API routes and handlers for the RAGFlow Server

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod errors;
pub mod events;
pub mod health;
pub mod runs;

use crate::server::RagflowServer;

/// Build the router for API endpoints
pub fn build_router(server: Arc<RagflowServer>) -> Router {
    Router::new()
        // Triggers
        .route("/v1/events", post(events::send_event))
        .route("/v1/events/:trigger_id/runs", get(runs::list_runs))
        // Runs
        .route("/v1/runs/:run_id/cancel", post(runs::cancel_run))
        // Health check
        .route("/health", get(health::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

pub use errors::ApiError;
