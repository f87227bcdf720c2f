use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tokio::task::JoinError;
use tracing::error;

use crate::errors::{LifecycleError, Stage};

#[derive(Debug)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub kind: &'static str,
    /// Absent when the failure happened outside any lifecycle stage.
    pub stage: Option<Stage>,
    pub message: String,
}

impl From<LifecycleError> for ErrorResponse {
    fn from(err: LifecycleError) -> Self {
        let status = if err.source.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };
        Self {
            status,
            kind: err.source.kind(),
            stage: Some(err.stage),
            message: err.to_string(),
        }
    }
}

impl From<JoinError> for ErrorResponse {
    fn from(err: JoinError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            stage: None,
            message: format!("lifecycle task failed: {}", err),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(stage = ?self.stage, error = %self.message, "lifecycle request failed");
        }
        (
            self.status,
            Json(json!({
                "error": self.kind,
                "stage": self.stage,
                "message": self.message
            })),
        )
            .into_response()
    }
}
