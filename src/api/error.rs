//! Maps `NodeworksError` to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::NodeworksError;

/// Standard API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

impl NodeworksError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            NodeworksError::PluginNotFound(_)
            | NodeworksError::NodeNotFound { .. }
            | NodeworksError::SourceNotFound(_)
            | NodeworksError::EntrypointNotFound(_) => StatusCode::NOT_FOUND,
            NodeworksError::LifecycleConflict(_) | NodeworksError::NotRunning(_) => {
                StatusCode::CONFLICT
            }
            NodeworksError::InvalidRequest(_) | NodeworksError::Json(_) => StatusCode::BAD_REQUEST,
            NodeworksError::ProcessExit { .. } | NodeworksError::ProtocolParse { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for NodeworksError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }

        let body = ApiErrorResponse {
            success: false,
            error: self.code().to_string(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
