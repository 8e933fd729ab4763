//! API request and response types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// `?id=` query used by the status/delete/run endpoints.
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

/// Status payload for the health check and task status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Plain confirmation message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error with an HTTP status and a fixed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: &'static str,
}

impl ApiError {
    pub fn missing_id() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Missing task ID",
        }
    }

    pub fn task_not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: "Task not found",
        }
    }

    pub fn already_running() -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: "Task is already running",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}
