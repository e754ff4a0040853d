use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use spark_shared::errors::AppResult;
use spark_shared::types::auth::AuthUser;
use spark_shared::types::ApiResponse;

use crate::index::IndexUpdate;
use crate::models::{CreateProfileRequest, NearbyQuery, Profile, UpdateProfileRequest};
use crate::routes::index_unavailable;
use crate::services::profile_service;
use crate::AppState;

// --- POST /profiles ---

pub async fn create_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProfileRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Profile>>)> {
    profile_service::check_interests(&req.interests)?;
    req.validate()?;

    let profile = profile_service::create_profile(&state.db, user.id, &req)?;

    state.dispatcher.dispatch(IndexUpdate::Add {
        user_id: user.id,
        tags: profile.interest_tags(),
    });

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(profile, "profile created")),
    ))
}

// --- GET /profiles/me ---

pub async fn get_my_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let profile = profile_service::get_profile_by_user_id(&state.db, user.id)?;
    Ok(Json(ApiResponse::ok(profile)))
}

// --- GET /profiles/:id ---

pub async fn get_profile(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let profile = profile_service::get_profile(&state.db, id)?;
    Ok(Json(ApiResponse::ok(profile)))
}

// --- PATCH /profiles ---

pub async fn update_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    if let Some(tags) = &req.interests {
        profile_service::check_interests(tags)?;
    }
    req.validate()?;

    let updated = profile_service::update_profile(&state.db, user.id, &req)?;

    if let Some(old) = updated.replaced_interests {
        state.dispatcher.dispatch(IndexUpdate::Replace {
            user_id: user.id,
            old,
            new: updated.profile.interest_tags(),
        });
    }

    Ok(Json(ApiResponse::ok(updated.profile)))
}

// --- GET /profiles/nearby ---

pub async fn nearby_profiles(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> AppResult<Json<ApiResponse<Vec<Profile>>>> {
    query.validate()?;
    let profiles = profile_service::nearby_profiles(
        &state.db,
        user.id,
        &query,
        state.config.max_radius_meters,
    )?;
    Ok(Json(ApiResponse::ok(profiles)))
}

// --- GET /profiles/:id/common-interests ---

#[derive(Debug, Serialize)]
pub struct CommonInterestsResponse {
    pub user_id: Uuid,
    pub other_user_id: Uuid,
    pub interests: BTreeSet<String>,
}

pub async fn common_interests(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(other_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CommonInterestsResponse>>> {
    let interests = state
        .index
        .common_interests(user.id, other_id)
        .await
        .map_err(index_unavailable)?;

    Ok(Json(ApiResponse::ok(CommonInterestsResponse {
        user_id: user.id,
        other_user_id: other_id,
        interests,
    })))
}
