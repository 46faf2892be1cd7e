//! HTTP error mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use corridor_core::{ErrorBody, ErrorCode, FabricError};
use thiserror::Error;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// API error
#[derive(Debug, Error)]
pub enum ApiError {
    /// Error raised by a fabric component
    #[error(transparent)]
    Fabric(#[from] FabricError),

    /// Body or query string could not be decoded
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// HTTP status for an error code
#[must_use]
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorCode::AlreadyExists | ErrorCode::CapacityExceeded | ErrorCode::InvalidTransition => {
            StatusCode::CONFLICT
        }
        ErrorCode::AttestationRequired => StatusCode::UNAUTHORIZED,
        ErrorCode::AttestationInvalid => StatusCode::FORBIDDEN,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        // Calibration caveats ride on a successful response
        ErrorCode::PartialConvergence => StatusCode::OK,
        // Client closed request
        ErrorCode::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    /// Wire body
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::Fabric(err) => ErrorBody::from(err),
            Self::BadRequest(reason) => ErrorBody {
                code: ErrorCode::InvalidArgument,
                reason: reason.clone(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.body();
        let status = status_for(body.code);
        if status.is_server_error() {
            tracing::error!(code = %body.code, reason = %body.reason, "request failed");
        } else {
            tracing::debug!(code = %body.code, reason = %body.reason, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorCode::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorCode::CapacityExceeded), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorCode::AttestationRequired), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorCode::AttestationInvalid), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorCode::Unavailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(ErrorCode::Cancelled).as_u16(), 499);
    }

    #[test]
    fn test_bad_request_body() {
        let err = ApiError::BadRequest("missing field `bytes`".to_string());
        let body = err.body();
        assert_eq!(body.code, ErrorCode::InvalidArgument);
        assert!(body.reason.contains("bytes"));
    }

    #[test]
    fn test_fabric_error_body_keeps_reason() {
        let err = ApiError::from(FabricError::not_found("corridor", "corr-9"));
        let body = err.body();
        assert_eq!(body.code, ErrorCode::NotFound);
        assert_eq!(body.reason, "corridor not found: corr-9");
    }
}
