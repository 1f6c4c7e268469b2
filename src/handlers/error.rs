//! HTTP error responses
//!
//! Maps `CulturalCenterError` onto status codes with a `{"detail": "..."}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use crate::utils::errors::{CulturalCenterError, ErrorSeverity};

/// Error returned by every handler
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub detail: String,
}

pub type ApiResult<T> = std::result::Result<T, HttpError>;

impl HttpError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }
}

impl From<CulturalCenterError> for HttpError {
    fn from(err: CulturalCenterError) -> Self {
        use CulturalCenterError as E;

        let (status, detail) = match &err {
            E::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            E::InvalidStateTransition { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
            E::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            E::Authentication(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            E::TokenExpired => (StatusCode::UNAUTHORIZED, "Token has expired".to_string()),
            E::PermissionDenied(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            E::UserNotFound { .. } => (StatusCode::NOT_FOUND, "User not found".to_string()),
            E::EventNotFound { .. } => (StatusCode::NOT_FOUND, "Event not found".to_string()),
            E::ReservationNotFound { .. } => (StatusCode::NOT_FOUND, "Reservation not found".to_string()),
            E::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            E::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            E::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            E::RateLimitExceeded => (StatusCode::TOO_MANY_REQUESTS, "Too many requests".to_string()),
            E::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
        };

        match err.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => error!(error = %err, status = status.as_u16(), "Request failed"),
            ErrorSeverity::Warning => warn!(error = %err, status = status.as_u16(), "Request rejected"),
            ErrorSeverity::Info => {}
        }

        Self { status, detail }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CulturalCenterError::InvalidInput("x".into()), StatusCode::BAD_REQUEST, "x"),
            (CulturalCenterError::Validation("v".into()), StatusCode::UNPROCESSABLE_ENTITY, "v"),
            (CulturalCenterError::TokenExpired, StatusCode::UNAUTHORIZED, "Token has expired"),
            (
                CulturalCenterError::EventNotFound { event_id: Uuid::nil() },
                StatusCode::NOT_FOUND,
                "Event not found",
            ),
            (CulturalCenterError::Conflict("dup".into()), StatusCode::CONFLICT, "dup"),
            (CulturalCenterError::RateLimitExceeded, StatusCode::TOO_MANY_REQUESTS, "Too many requests"),
            (
                CulturalCenterError::Internal("secret detail".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ),
        ];

        for (err, status, detail) in cases {
            let http = HttpError::from(err);
            assert_eq!(http.status, status);
            assert_eq!(http.detail, detail);
        }
    }
}
