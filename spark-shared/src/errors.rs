use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Profile errors
/// - E2xxx: Interest/discovery errors
/// - E3xxx: Swipe/match errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    TokenExpired,
    ServiceUnavailable,
    BadRequest,

    // Profile (E1xxx)
    ProfileNotFound,
    ProfileAlreadyExists,
    UserNotFound,
    InvalidLocation,

    // Interests (E2xxx)
    UnknownInterest,
    InterestIndexUnavailable,

    // Swipe/match (E3xxx)
    CannotSwipeSelf,
    AlreadySwiped,
    SwipeNotFound,
    MatchNotFound,
    NotMatchParticipant,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::TokenExpired => "E0006",
            Self::ServiceUnavailable => "E0007",
            Self::BadRequest => "E0008",

            // Profile
            Self::ProfileNotFound => "E1001",
            Self::ProfileAlreadyExists => "E1002",
            Self::UserNotFound => "E1003",
            Self::InvalidLocation => "E1004",

            // Interests
            Self::UnknownInterest => "E2001",
            Self::InterestIndexUnavailable => "E2002",

            // Swipe/match
            Self::CannotSwipeSelf => "E3001",
            Self::AlreadySwiped => "E3002",
            Self::SwipeNotFound => "E3003",
            Self::MatchNotFound => "E3004",
            Self::NotMatchParticipant => "E3005",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable | Self::InterestIndexUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ValidationError | Self::BadRequest | Self::InvalidLocation
            | Self::UnknownInterest => StatusCode::BAD_REQUEST,
            // Swipe rejections are client errors the caller can read and stop retrying.
            Self::CannotSwipeSelf | Self::AlreadySwiped => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::ProfileNotFound | Self::UserNotFound
            | Self::SwipeNotFound | Self::MatchNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::NotMatchParticipant => StatusCode::FORBIDDEN,
            Self::ProfileAlreadyExists => StatusCode::CONFLICT,
        }
    }

    /// Whether a client may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable | Self::InterestIndexUnavailable)
    }
}

/// Failure of a backing store (PostgreSQL or Redis), classified by how callers react to it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A unique (or other integrity) constraint rejected the write.
    #[error("constraint conflict: {0}")]
    Conflict(String),

    /// Timeouts, dropped connections, pool exhaustion, serialization failures.
    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("store failure: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::Error;

        match err {
            Error::NotFound => Self::NotFound,
            Error::DatabaseError(kind, info) => {
                let message = info.message().to_string();
                match kind {
                    DatabaseErrorKind::UniqueViolation => Self::Conflict(message),
                    DatabaseErrorKind::SerializationFailure
                    | DatabaseErrorKind::ClosedConnection
                    | DatabaseErrorKind::UnableToSendCommand => Self::Transient(message),
                    // statement_timeout and lock_timeout cancellations come back untyped
                    _ if message.contains("canceling statement") => Self::Transient(message),
                    _ => Self::Fatal(message),
                }
            }
            Error::BrokenTransactionManager => Self::Transient("broken transaction manager".into()),
            other => Self::Fatal(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for StoreError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Self::Transient(format!("connection pool: {err}"))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            Self::Transient(err.to_string())
        } else {
            Self::Fatal(err.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for StoreError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Transient("operation timed out".into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// The code this error is reported under.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Internal(_) => ErrorCode::InternalError,
            AppError::Store(StoreError::NotFound) => ErrorCode::NotFound,
            AppError::Store(StoreError::Transient(_)) => ErrorCode::ServiceUnavailable,
            AppError::Store(_) => ErrorCode::InternalError,
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Store(StoreError::from(err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = serde_json::to_value(errors.field_errors()).unwrap_or_default();
        Self::with_details(ErrorCode::ValidationError, "invalid request data", details)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Store(err) => match err {
                StoreError::NotFound => (
                    StatusCode::NOT_FOUND,
                    ApiErrorResponse::new("E0003", "resource not found"),
                ),
                StoreError::Transient(e) => {
                    tracing::warn!(error = %e, "transient store failure");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        ApiErrorResponse::new("E0007", "service temporarily unavailable, retry later"),
                    )
                }
                StoreError::Conflict(e) | StoreError::Fatal(e) => {
                    tracing::error!(error = %e, "store error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    )
                }
            },
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::Error as DieselError;

    fn db_error(kind: DatabaseErrorKind, message: &str) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(message.to_string()))
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err = StoreError::from(db_error(
            DatabaseErrorKind::UniqueViolation,
            "duplicate key value violates unique constraint \"swipes_swiper_swipee_key\"",
        ));
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn statement_timeout_is_transient() {
        let err = StoreError::from(db_error(
            DatabaseErrorKind::Unknown,
            "canceling statement due to statement timeout",
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn serialization_failure_is_transient() {
        let err = StoreError::from(db_error(DatabaseErrorKind::SerializationFailure, "could not serialize"));
        assert!(err.is_transient());
    }

    #[test]
    fn check_violation_is_fatal() {
        let err = StoreError::from(db_error(DatabaseErrorKind::CheckViolation, "swipes_not_self"));
        assert!(matches!(err, StoreError::Fatal(_)));
    }

    #[test]
    fn diesel_not_found_maps_to_not_found() {
        assert!(matches!(StoreError::from(DieselError::NotFound), StoreError::NotFound));
    }

    #[test]
    fn transient_store_error_surfaces_as_retryable() {
        let err = AppError::from(StoreError::Transient("timeout".into()));
        assert_eq!(err.error_code(), ErrorCode::ServiceUnavailable);
        assert!(err.error_code().is_retryable());
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn swipe_rejections_are_client_errors() {
        assert_eq!(ErrorCode::CannotSwipeSelf.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::AlreadySwiped.status_code(), StatusCode::BAD_REQUEST);
        assert!(!ErrorCode::AlreadySwiped.is_retryable());
    }
}
