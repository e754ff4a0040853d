use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use spark_shared::errors::AppResult;
use spark_shared::types::ApiResponse;

use crate::services::profile_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub ok: bool,
}

/// POST /internal/activity: bump `users.last_active` (service-to-service, no auth)
pub async fn touch_activity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActivityRequest>,
) -> AppResult<Json<ApiResponse<ActivityResponse>>> {
    profile_service::touch_activity(&state.db, req.user_id)?;
    tracing::debug!(user_id = %req.user_id, "activity recorded");
    Ok(Json(ApiResponse::ok(ActivityResponse { ok: true })))
}
