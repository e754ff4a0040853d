use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use spark_shared::errors::AppResult;
use spark_shared::types::auth::AuthUser;
use spark_shared::types::{ApiResponse, PageParams};

use crate::engine::{self, SwipeStore};
use crate::events::publisher;
use crate::models::{Match, Swipe, SwipeRequest, SwipeView};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SwipeResponse {
    pub swipe: Swipe,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub new_match: Option<Match>,
}

// --- POST /swipes ---

pub async fn create_swipe(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SwipeRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<SwipeResponse>>)> {
    let outcome = engine::record_swipe(&state.store, user.id, req.swipee_id, req.swipe_type)?;

    if outcome.new_match.is_some() {
        notify_match(&state, user.id, req.swipee_id).await;
    }

    let message = if outcome.new_match.is_some() { "it's a match" } else { "swipe recorded" };
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            SwipeResponse { swipe: outcome.swipe, new_match: outcome.new_match },
            message,
        )),
    ))
}

/// Best effort: the match is committed whether or not the job reaches the broker.
async fn notify_match(state: &AppState, swiper_id: Uuid, swipee_id: Uuid) {
    let parties = match state.store.users(&[swiper_id, swipee_id]) {
        Ok(parties) => parties,
        Err(e) => {
            metrics::counter!("match_notifications_failed_total").increment(1);
            tracing::error!(error = %e, swipee_id = %swipee_id, "could not load match parties for notification");
            return;
        }
    };

    let swiper = parties.iter().find(|u| u.id == swiper_id);
    let swipee = parties.iter().find(|u| u.id == swipee_id);
    let (Some(swiper), Some(swipee)) = (swiper, swipee) else {
        metrics::counter!("match_notifications_failed_total").increment(1);
        tracing::error!(swiper_id = %swiper_id, swipee_id = %swipee_id, "match party missing, notification skipped");
        return;
    };

    publisher::publish_notification(&state.rabbitmq, engine::match_notification(swiper, swipee)).await;
}

// --- GET /swipes/me ---

pub async fn my_swipes(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
) -> AppResult<Json<ApiResponse<Vec<SwipeView>>>> {
    let history = engine::swipe_history(&state.store, user.id, &page)?;
    Ok(Json(ApiResponse::ok(history)))
}

// --- GET /swipes/:id ---

pub async fn get_swipe(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SwipeView>>> {
    let swipe = engine::get_swipe(&state.store, id)?;
    Ok(Json(ApiResponse::ok(swipe)))
}
