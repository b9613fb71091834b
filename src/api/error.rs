//! API Error Types
//!
//! Maps source and engine failures onto HTTP status codes:
//!
//! | Failure                        | Status |
//! |--------------------------------|--------|
//! | invalid request / parse error  | 400    |
//! | unknown source kind            | 404    |
//! | configuration / settings error | 422    |
//! | historian read failed          | 502    |
//! | historian read timed out       | 504    |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::historian::HistorianError;
use crate::sources::SourceError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Data source or engine failure
    #[error("{0}")]
    Source(#[from] SourceError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<HistorianError> for ApiError {
    fn from(e: HistorianError) -> Self {
        ApiError::Source(SourceError::Historian(e))
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Status code and stable error code for this failure
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Source(SourceError::UnknownKind(_)) => {
                (StatusCode::NOT_FOUND, "UNKNOWN_SOURCE")
            }
            ApiError::Source(SourceError::Settings(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "SOURCE_SETTINGS_ERROR")
            }
            ApiError::Source(SourceError::Historian(e)) => match e {
                HistorianError::Parse(_) => (StatusCode::BAD_REQUEST, "PARSE_ERROR"),
                HistorianError::Config(_) => (StatusCode::UNPROCESSABLE_ENTITY, "CONFIG_ERROR"),
                HistorianError::Upstream(_) if e.is_timeout() => {
                    (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT")
                }
                HistorianError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            },
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::historian::{Leg, TransportError, UpstreamError};

    fn upstream(source: TransportError) -> ApiError {
        HistorianError::Upstream(UpstreamError {
            leg: Leg::Historical,
            url: "http://pi/pi/trn".to_string(),
            source,
        })
        .into()
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::from(HistorianError::Parse("bad".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(HistorianError::Config("no url".to_string())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                upstream(TransportError::Status {
                    status: 500,
                    body: String::new(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                upstream(TransportError::Timeout { timeout_secs: 30 }),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ApiError::Source(SourceError::UnknownKind("x".to_string())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Validation("empty".to_string()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_and_code().0, expected, "{}", error);
        }
    }

    #[test]
    fn test_into_response_status() {
        let response = upstream(TransportError::Timeout { timeout_secs: 1 }).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
