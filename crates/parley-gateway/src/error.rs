//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parley_voice::VoiceError;
use serde_json::json;
use tracing::{error, warn};

/// API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<VoiceError> for ApiError {
    fn from(err: VoiceError) -> Self {
        match &err {
            VoiceError::NoFileProvided => ApiError::bad_request(err.to_string()),
            VoiceError::OutputNotFound(id) => {
                warn!(target: "parley::gateway", id = %id, "Requested reply audio is gone or unknown");
                ApiError::not_found(err.to_string())
            }
            e if e.is_remote() => {
                error!(target: "parley::gateway", "Upstream service failed: {}", err);
                ApiError::internal(err.to_string())
            }
            _ => {
                error!(target: "parley::gateway", "Request failed: {}", err);
                ApiError::internal(err.to_string())
            }
        }
    }
}
