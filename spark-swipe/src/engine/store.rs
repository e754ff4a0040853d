use uuid::Uuid;

use spark_shared::errors::StoreError;

use super::SwipeError;
use crate::models::{Match, NewMatch, NewSwipe, Swipe, SwipeView, UserSummary};

/// Statements available inside one swipe transaction.
pub trait SwipeTx {
    /// Blocks until no other transaction holds the lock for `pair_id`. Released at commit
    /// or rollback.
    fn lock_pair(&mut self, pair_id: &str) -> Result<(), StoreError>;

    /// `Conflict` if the swiper already swiped the swipee, `NotFound` if either user is unknown.
    fn insert_swipe(&mut self, swipe: &NewSwipe) -> Result<Swipe, StoreError>;

    /// The live like from `swiper_id` to `swipee_id`, if any.
    fn find_like(&mut self, swiper_id: Uuid, swipee_id: Uuid) -> Result<Option<Swipe>, StoreError>;

    /// `None` when a match with the same id already exists; the existing row is untouched.
    fn insert_match(&mut self, new_match: &NewMatch) -> Result<Option<Match>, StoreError>;
}

pub trait SwipeStore: Send + Sync {
    /// Runs `f` in a transaction, committing only if it returns `Ok`.
    fn transaction<T, F>(&self, f: F) -> Result<T, SwipeError>
    where
        F: FnOnce(&mut dyn SwipeTx) -> Result<T, SwipeError>;

    /// Swipes made by `user_id`, newest first (ties broken by id, descending).
    fn swipe_history(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<SwipeView>, StoreError>;

    fn swipe_by_id(&self, id: Uuid) -> Result<Option<SwipeView>, StoreError>;

    /// Matches `user_id` takes part in, newest first.
    fn list_matches(
        &self,
        user_id: Uuid,
        active_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Match>, StoreError>;

    fn find_match(&self, id: &str) -> Result<Option<Match>, StoreError>;

    fn update_match_active(&self, id: &str, is_active: bool) -> Result<Match, StoreError>;

    fn users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, StoreError>;
}
