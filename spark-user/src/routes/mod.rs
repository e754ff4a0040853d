pub mod admin;
pub mod discovery;
pub mod health;
pub mod interests;
pub mod internal;
pub mod profile;

use spark_shared::errors::{AppError, ErrorCode, StoreError};

/// Reads from the interest index fail soft with a retryable 503.
pub(crate) fn index_unavailable(err: StoreError) -> AppError {
    tracing::warn!(error = %err, "interest index read failed");
    AppError::new(ErrorCode::InterestIndexUnavailable, "interest index temporarily unavailable")
}
