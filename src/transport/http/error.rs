//! HTTP error bodies
//!
//! Converts engine errors into the user-visible failure shape:
//! `{request_id, timestamp, status, message, errors[]}` with the
//! engine's stable error codes, mapped onto HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// One coded error entry
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ErrorEntry {
    pub code: String,
    pub message: String,
}

/// User-visible failure body
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ErrorBody {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub message: String,
    pub errors: Vec<ErrorEntry>,
}

/// Engine error wrapped for the HTTP surface
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    /// HTTP status for the underlying engine error
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            EngineError::InvalidRequest(_)
            | EngineError::Validation(_)
            | EngineError::Unresolvable(_) => StatusCode::BAD_REQUEST,
            EngineError::PolicyFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Cancelled(_) => StatusCode::REQUEST_TIMEOUT,
            EngineError::PricingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::InvariantViolated(_)
            | EngineError::Internal(_)
            | EngineError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            request_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            status: "error".to_string(),
            message: self.0.to_string(),
            errors: vec![ErrorEntry {
                code: self.0.code().to_string(),
                message: self.0.to_string(),
            }],
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::debug!(code = self.0.code(), %status, "request failed");
        (status, Json(self.to_body())).into_response()
    }
}

/// Result type for HTTP handlers
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_errors_are_4xx() {
        let err = ApiError(EngineError::InvalidRequest("missing source".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let body = err.to_body();
        assert_eq!(body.errors[0].code, "INVALID_REQUEST");
        assert_eq!(body.status, "error");
    }

    #[test]
    fn test_invariant_violations_are_5xx_with_detail() {
        let err = ApiError(EngineError::InvariantViolated(
            "[closure] dangling reference".to_string(),
        ));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = err.to_body();
        assert_eq!(body.errors[0].code, "INVARIANT_VIOLATED");
        // violation detail is surfaced verbatim
        assert!(body.message.contains("dangling reference"));
    }

    #[test]
    fn test_pricing_unavailable_is_503() {
        let err = ApiError(EngineError::PricingUnavailable("store down".to_string()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
