use axum::extract::{Path, Query, State};
use axum::Json;
use std::sync::Arc;

use spark_shared::errors::AppResult;
use spark_shared::types::auth::AuthUser;
use spark_shared::types::{ApiResponse, PageParams};

use crate::engine;
use crate::models::{Match, MatchListQuery, UpdateMatchRequest};
use crate::AppState;

// --- GET /matches ---

pub async fn list_matches(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<MatchListQuery>,
) -> AppResult<Json<ApiResponse<Vec<Match>>>> {
    let page = PageParams::new(query.limit, query.offset);
    let matches = engine::list_matches(&state.store, user.id, query.active_only, &page)?;
    Ok(Json(ApiResponse::ok(matches)))
}

// --- PATCH /matches/:id ---

pub async fn update_match(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<String>,
    Json(req): Json<UpdateMatchRequest>,
) -> AppResult<Json<ApiResponse<Match>>> {
    let updated = engine::set_match_active(&state.store, user.id, &match_id, req.is_active)?;
    Ok(Json(ApiResponse::ok(updated)))
}
