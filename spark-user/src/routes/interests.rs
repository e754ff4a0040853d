use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use spark_shared::errors::{AppError, AppResult, ErrorCode};
use spark_shared::interests::{is_valid_interest, SYSTEM_INTERESTS};
use spark_shared::types::auth::AuthUser;
use spark_shared::types::ApiResponse;

use crate::routes::index_unavailable;
use crate::AppState;

pub async fn list_interests() -> Json<ApiResponse<&'static [&'static str]>> {
    Json(ApiResponse::ok(SYSTEM_INTERESTS))
}

fn known_tag(tag: &str) -> AppResult<()> {
    if is_valid_interest(tag) {
        Ok(())
    } else {
        Err(AppError::new(ErrorCode::UnknownInterest, format!("unknown interest: {tag}")))
    }
}

#[derive(Debug, Serialize)]
pub struct BucketResponse {
    pub interest: String,
    pub user_ids: Vec<Uuid>,
}

pub async fn interest_members(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> AppResult<Json<ApiResponse<BucketResponse>>> {
    known_tag(&tag)?;
    let user_ids = state.index.interest_bucket(&tag).await.map_err(index_unavailable)?;
    Ok(Json(ApiResponse::ok(BucketResponse { interest: tag, user_ids })))
}

#[derive(Debug, Serialize)]
pub struct BucketSizeResponse {
    pub interest: String,
    pub count: u64,
}

pub async fn interest_count(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> AppResult<Json<ApiResponse<BucketSizeResponse>>> {
    known_tag(&tag)?;
    let count = state.index.interest_bucket_size(&tag).await.map_err(index_unavailable)?;
    Ok(Json(ApiResponse::ok(BucketSizeResponse { interest: tag, count })))
}
