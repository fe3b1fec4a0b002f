use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::cache::CacheError;
use crate::controller::ControllerError;
use crate::downloads::DownloadError;
use crate::intercept::InterceptError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("upstream unreachable: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::Upstream(_) => "UPSTREAM_UNREACHABLE",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DownloadError> for GatewayError {
    fn from(value: DownloadError) -> Self {
        match value {
            DownloadError::JobNotFound(id) => GatewayError::NotFound(format!("download {id}")),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

impl From<ControllerError> for GatewayError {
    fn from(value: ControllerError) -> Self {
        match value {
            ControllerError::Download(inner) => inner.into(),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

impl From<CacheError> for GatewayError {
    fn from(value: CacheError) -> Self {
        GatewayError::Internal(value.to_string())
    }
}

impl From<InterceptError> for GatewayError {
    fn from(value: InterceptError) -> Self {
        GatewayError::Upstream(value.to_string())
    }
}
