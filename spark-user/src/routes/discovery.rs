use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use spark_shared::errors::AppResult;
use spark_shared::types::auth::AuthUser;
use spark_shared::types::ApiResponse;

use crate::routes::index_unavailable;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DiscoverQuery {
    #[serde(default)]
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct Candidate {
    pub user_id: Uuid,
    pub shared_interests: BTreeSet<String>,
}

/// GET /discover: users sharing at least one of the caller's indexed interests.
pub async fn discover(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<DiscoverQuery>,
) -> AppResult<Json<ApiResponse<Vec<Candidate>>>> {
    let mine = state
        .index
        .user_interests(user.id)
        .await
        .map_err(index_unavailable)?;
    let tags: Vec<String> = mine.iter().cloned().collect();

    let ids = state
        .index
        .users_with_any_interest(user.id, &tags, query.limit)
        .await
        .map_err(index_unavailable)?;

    let mut interests = state.index.many_user_interests(&ids).await;

    let candidates = ids
        .into_iter()
        .map(|id| Candidate {
            user_id: id,
            shared_interests: interests
                .remove(&id)
                .map(|theirs| theirs.intersection(&mine).cloned().collect())
                .unwrap_or_default(),
        })
        .collect();

    Ok(Json(ApiResponse::ok(candidates)))
}
