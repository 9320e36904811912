//! Error handling for the RAGFlow Server API
//!
//! Every error body has the form `{"error": {"code": ..., "message": ...}}`.

use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::error;

use crate::error::ServerError;

/// API Error type for returning standard error responses
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),
    /// Not found (404)
    NotFound(String),
    /// Conflict (409)
    Conflict(String),
    /// Internal server error (500)
    InternalServerError(String),
    /// Wrapped server error
    ServerError(ServerError),
}

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        ApiError::ServerError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ServerError(err) => write!(f, "Server Error: {}", err),
        }
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "ERR_BAD_REQUEST", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "ERR_NOT_FOUND", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "ERR_CONFLICT", msg.clone()),
            ApiError::InternalServerError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ERR_INTERNAL_SERVER_ERROR",
                msg.clone(),
            ),
            ApiError::ServerError(err) => {
                let message = err.to_string();
                match err {
                    ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "ERR_NOT_FOUND", message),
                    ServerError::ValidationError(_) => {
                        (StatusCode::BAD_REQUEST, "ERR_VALIDATION_ERROR", message)
                    }
                    ServerError::Conflict(_) => (StatusCode::CONFLICT, "ERR_CONFLICT", message),
                    ServerError::RuntimeError(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "ERR_RUNTIME_ERROR", message)
                    }
                    ServerError::StateStoreError(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "ERR_STATE_STORE_ERROR", message)
                    }
                    ServerError::KnowledgeBaseError(_) => {
                        (StatusCode::BAD_GATEWAY, "ERR_KNOWLEDGE_BASE_ERROR", message)
                    }
                    ServerError::ConfigurationError(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "ERR_CONFIGURATION_ERROR",
                        message,
                    ),
                    ServerError::InternalError(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "ERR_INTERNAL_SERVER_ERROR",
                        message,
                    ),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            error!(code, %message, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
