//! Error handling for the cultural center service
//!
//! This module defines the main error type used throughout the application
//! and provides a unified error handling strategy. The HTTP layer maps these
//! variants onto status codes in `handlers::error`.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for the cultural center application
#[derive(Error, Debug)]
pub enum CulturalCenterError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: Uuid },

    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: Uuid },

    #[error("Reservation not found: {reservation_id}")]
    ReservationNotFound { reservation_id: Uuid },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email delivery error: {0}")]
    Email(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for cultural center operations
pub type Result<T> = std::result::Result<T, CulturalCenterError>;

impl CulturalCenterError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            CulturalCenterError::Database(_) => false,
            CulturalCenterError::Migration(_) => false,
            CulturalCenterError::Config(_) => false,
            CulturalCenterError::Authentication(_) => false,
            CulturalCenterError::TokenExpired => false,
            CulturalCenterError::PermissionDenied(_) => false,
            CulturalCenterError::UserNotFound { .. } => false,
            CulturalCenterError::EventNotFound { .. } => false,
            CulturalCenterError::ReservationNotFound { .. } => false,
            CulturalCenterError::NotFound(_) => false,
            CulturalCenterError::Conflict(_) => false,
            CulturalCenterError::InvalidStateTransition { .. } => false,
            CulturalCenterError::InvalidInput(_) => false,
            CulturalCenterError::Validation(_) => false,
            CulturalCenterError::PayloadTooLarge(_) => false,
            CulturalCenterError::Redis(_) => true,
            CulturalCenterError::Http(_) => true,
            CulturalCenterError::Email(_) => true,
            CulturalCenterError::Serialization(_) => false,
            CulturalCenterError::Csv(_) => false,
            CulturalCenterError::Io(_) => true,
            CulturalCenterError::UrlParse(_) => false,
            CulturalCenterError::RateLimitExceeded => true,
            CulturalCenterError::ServiceUnavailable(_) => true,
            CulturalCenterError::Internal(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CulturalCenterError::Database(_) => ErrorSeverity::Critical,
            CulturalCenterError::Migration(_) => ErrorSeverity::Critical,
            CulturalCenterError::Config(_) => ErrorSeverity::Critical,
            CulturalCenterError::Internal(_) => ErrorSeverity::Critical,
            CulturalCenterError::Authentication(_) => ErrorSeverity::Warning,
            CulturalCenterError::TokenExpired => ErrorSeverity::Warning,
            CulturalCenterError::PermissionDenied(_) => ErrorSeverity::Warning,
            CulturalCenterError::RateLimitExceeded => ErrorSeverity::Warning,
            CulturalCenterError::UserNotFound { .. }
            | CulturalCenterError::EventNotFound { .. }
            | CulturalCenterError::ReservationNotFound { .. }
            | CulturalCenterError::NotFound(_)
            | CulturalCenterError::Conflict(_)
            | CulturalCenterError::InvalidStateTransition { .. }
            | CulturalCenterError::InvalidInput(_)
            | CulturalCenterError::Validation(_)
            | CulturalCenterError::PayloadTooLarge(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_of_domain_errors() {
        let err = CulturalCenterError::InvalidInput("bad".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Info);
        assert!(!err.is_recoverable());

        let err = CulturalCenterError::Config("missing".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_transient_errors_are_recoverable() {
        assert!(CulturalCenterError::RateLimitExceeded.is_recoverable());
        assert!(CulturalCenterError::ServiceUnavailable("redis".into()).is_recoverable());
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }
}
