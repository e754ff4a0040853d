use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use spark_shared::errors::AppResult;
use spark_shared::middleware::AdminUser;
use spark_shared::types::ApiResponse;

use crate::index::reseed::ReseedReport;
use crate::jobs;
use crate::AppState;

/// POST /admin/reseed: rebuilds the interest index now instead of waiting for the timer.
pub async fn reseed_index(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<ReseedReport>>> {
    tracing::info!(admin_id = %admin.id, "manual interest index reseed requested");
    let report = jobs::reseed_interest_index(&state).await?;
    Ok(Json(ApiResponse::ok_with_message(report, "interest index reseeded")))
}
