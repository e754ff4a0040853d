use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{matches, swipes, users};

// --- SwipeType ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeType {
    Like,
    Pass,
}

impl SwipeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeType::Like => "like",
            SwipeType::Pass => "pass",
        }
    }
}

impl std::fmt::Display for SwipeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Swipe ---

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = swipes)]
pub struct Swipe {
    pub id: Uuid,
    pub swiper_id: Uuid,
    pub swipee_id: Uuid,
    pub swipe_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Swipe {
    pub fn is_like(&self) -> bool {
        self.swipe_type == SwipeType::Like.as_str()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = swipes)]
pub struct NewSwipe {
    pub id: Uuid,
    pub swiper_id: Uuid,
    pub swipee_id: Uuid,
    pub swipe_type: String,
    pub created_at: DateTime<Utc>,
}

impl NewSwipe {
    pub fn new(swiper_id: Uuid, swipee_id: Uuid, swipe_type: SwipeType) -> Self {
        Self {
            id: Uuid::now_v7(),
            swiper_id,
            swipee_id,
            swipe_type: swipe_type.as_str().to_string(),
            created_at: Utc::now(),
        }
    }
}

// --- Match ---

/// Identity of the match between two users: both ids in canonical text form, sorted, joined
/// with `_`. Independent of who swiped first.
pub fn pair_id(a: Uuid, b: Uuid) -> String {
    let (a, b) = (a.to_string(), b.to_string());
    if a <= b {
        format!("{a}_{b}")
    } else {
        format!("{b}_{a}")
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = matches)]
pub struct Match {
    pub id: String,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = matches)]
pub struct NewMatch {
    pub id: String,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewMatch {
    pub fn for_pair(a: Uuid, b: Uuid) -> Self {
        let (user1_id, user2_id) = if a.to_string() <= b.to_string() { (a, b) } else { (b, a) };
        let now = Utc::now();
        Self {
            id: pair_id(a, b),
            user1_id,
            user2_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

// --- Users (read-only here) ---

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub email: String,
}

/// A swipe with both parties resolved.
#[derive(Debug, Clone, Serialize)]
pub struct SwipeView {
    #[serde(flatten)]
    pub swipe: Swipe,
    pub swiper: Option<UserSummary>,
    pub swipee: Option<UserSummary>,
}

// --- Requests ---

#[derive(Debug, Deserialize)]
pub struct SwipeRequest {
    pub swipee_id: Uuid,
    pub swipe_type: SwipeType,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMatchRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct MatchListQuery {
    #[serde(default)]
    pub active_only: bool,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_id_ignores_argument_order() {
        let a = Uuid::parse_str("9f1c1a52-0000-4000-8000-000000000001").unwrap();
        let b = Uuid::parse_str("1a2b3c4d-0000-4000-8000-000000000002").unwrap();
        assert_eq!(pair_id(a, b), pair_id(b, a));
        assert_eq!(
            pair_id(a, b),
            "1a2b3c4d-0000-4000-8000-000000000002_9f1c1a52-0000-4000-8000-000000000001"
        );
    }

    #[test]
    fn new_match_orders_users_like_its_id() {
        let a = Uuid::parse_str("ffffffff-0000-4000-8000-000000000000").unwrap();
        let b = Uuid::parse_str("00000000-0000-4000-8000-000000000000").unwrap();
        let m = NewMatch::for_pair(a, b);
        assert_eq!(m.user1_id, b);
        assert_eq!(m.user2_id, a);
        assert_eq!(m.id, format!("{b}_{a}"));
        assert!(m.is_active);
    }

    #[test]
    fn swipe_type_uses_lowercase_wire_names() {
        let req: SwipeRequest = serde_json::from_value(serde_json::json!({
            "swipee_id": Uuid::nil(),
            "swipe_type": "pass",
        }))
        .unwrap();
        assert_eq!(req.swipe_type, SwipeType::Pass);
        assert!(serde_json::from_value::<SwipeRequest>(serde_json::json!({
            "swipee_id": Uuid::nil(),
            "swipe_type": "superlike",
        }))
        .is_err());
    }
}
