use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition: {0}")]
    StateViolation(String),

    #[error("Event is not active")]
    EventNotActive,

    #[error("Event has already started")]
    EventAlreadyStarted,

    #[error("Booking quota exceeded: at most {limit} seats per user")]
    QuotaExceeded { limit: i64 },

    #[error("No seats available")]
    NoAvailability,

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StateViolation(_)
            | AppError::EventNotActive
            | AppError::EventAlreadyStarted
            | AppError::NoAvailability => StatusCode::CONFLICT,
            AppError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::StateViolation(_) => "STATE_VIOLATION",
            AppError::EventNotActive => "EVENT_NOT_ACTIVE",
            AppError::EventAlreadyStarted => "EVENT_ALREADY_STARTED",
            AppError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            AppError::NoAvailability => "NO_AVAILABILITY",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ExternalServiceError(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Client mistakes are logged at warn, everything else at error.
    fn log(&self) {
        match self {
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::ExternalServiceError(msg) | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            _ => {
                warn!(code = self.code(), message = %self, "Request rejected");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        let public_message = match &self {
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalServerError(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        let details = match &self {
            AppError::QuotaExceeded { limit } => Some(serde_json::json!({ "limit": limit })),
            _ => None,
        };

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_conflict() {
        for err in [
            AppError::StateViolation("booking is not pending".into()),
            AppError::EventNotActive,
            AppError::EventAlreadyStarted,
            AppError::NoAvailability,
        ] {
            assert_eq!(err.status_code(), StatusCode::CONFLICT, "{}", err.code());
        }
    }

    #[test]
    fn test_non_owner_is_forbidden_not_unauthenticated() {
        let err = AppError::Unauthorized("not the booking owner".into());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "UNAUTHORIZED");

        let err = AppError::AuthError("missing X-User-Id".into());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_database_error_hides_details() {
        let response = AppError::DatabaseError(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_quota_message_includes_limit() {
        let err = AppError::QuotaExceeded { limit: 4 };
        assert_eq!(err.to_string(), "Booking quota exceeded: at most 4 seats per user");
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }
}
