//! Wire types and error mapping for the HTTP API

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::runner::{ExecuteError, ExecutionReport, IntakeError};

/// Body of an execute request
#[derive(Debug, Default, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub code: Option<String>,
}

/// Body of an execute response
///
/// `error` serializes as `null` on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ExecuteResponse {
    fn failure(error: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error),
        }
    }
}

impl From<&ExecutionReport> for ExecuteResponse {
    fn from(report: &ExecutionReport) -> Self {
        Self {
            success: report.is_success(),
            output: report.output_text(),
            error: report.error_text(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

impl HealthResponse {
    pub(crate) fn ok() -> Self {
        Self {
            status: "OK",
            message: "Server is running",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Errors returned to HTTP clients
///
/// The display text is exactly what lands in the `error` field.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(#[from] IntakeError),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Server busy: {0}")]
    Busy(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Route not found")]
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Execution(_) | Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl From<ExecuteError> for ApiError {
    fn from(err: ExecuteError) -> Self {
        match err {
            ExecuteError::InvalidRequest(e) => Self::InvalidRequest(e),
            ExecuteError::Busy(e) => Self::Busy(e.to_string()),
            ExecuteError::Supervisor(e) => Self::Execution(e.to_string()),
            ExecuteError::Workspace(e) => Self::Server(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::InvalidRequest(_) | Self::PayloadTooLarge | Self::NotFound => (
                status,
                Json(ErrorBody {
                    error: self.to_string(),
                }),
            )
                .into_response(),
            Self::Busy(_) | Self::Execution(_) | Self::Server(_) => {
                warn!(%status, error = %self, "execution request failed");
                (status, Json(ExecuteResponse::failure(self.to_string()))).into_response()
            }
        }
    }
}
