//! Swipe recording and mutual-like detection.
//!
//! A swipe and the match it may complete are written in one transaction that first takes
//! an advisory lock on the pair id. Two opposite likes racing each other are therefore
//! applied one after the other: the second sees the first and creates the match. The
//! primary key on `matches.id` still rejects any second row for the pair.

pub mod pg;
pub mod store;

#[cfg(test)]
pub mod memory;

use metrics::counter;
use uuid::Uuid;

use spark_shared::errors::{AppError, ErrorCode, StoreError};
use spark_shared::types::event::payloads::NotificationJob;
use spark_shared::types::PageParams;

use crate::models::{pair_id, Match, NewMatch, NewSwipe, Swipe, SwipeType, SwipeView, UserSummary};

pub use store::{SwipeStore, SwipeTx};

pub const MATCH_SUBJECT: &str = "New Spark Match!";

#[derive(Debug, thiserror::Error)]
pub enum SwipeError {
    #[error("cannot swipe on yourself")]
    SelfSwipe,

    #[error("you have already swiped on this user")]
    DuplicateSwipe,

    #[error("user not found")]
    UserNotFound,

    #[error("swipe not found")]
    SwipeNotFound,

    #[error("match not found")]
    MatchNotFound,

    #[error("only participants can change a match")]
    NotParticipant,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<diesel::result::Error> for SwipeError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Store(StoreError::from(err))
    }
}

impl From<diesel::r2d2::PoolError> for SwipeError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Self::Store(StoreError::from(err))
    }
}

impl From<SwipeError> for AppError {
    fn from(err: SwipeError) -> Self {
        let message = err.to_string();
        match err {
            SwipeError::SelfSwipe => AppError::new(ErrorCode::CannotSwipeSelf, message),
            SwipeError::DuplicateSwipe => AppError::new(ErrorCode::AlreadySwiped, message),
            SwipeError::UserNotFound => AppError::new(ErrorCode::UserNotFound, message),
            SwipeError::SwipeNotFound => AppError::new(ErrorCode::SwipeNotFound, message),
            SwipeError::MatchNotFound => AppError::new(ErrorCode::MatchNotFound, message),
            SwipeError::NotParticipant => AppError::new(ErrorCode::NotMatchParticipant, message),
            SwipeError::Store(e) => AppError::Store(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwipeOutcome {
    pub swipe: Swipe,
    /// Set only when this call created the match.
    pub new_match: Option<Match>,
}

pub fn record_swipe<S: SwipeStore>(
    store: &S,
    swiper_id: Uuid,
    swipee_id: Uuid,
    swipe_type: SwipeType,
) -> Result<SwipeOutcome, SwipeError> {
    if swiper_id == swipee_id {
        return Err(SwipeError::SelfSwipe);
    }

    let pair = pair_id(swiper_id, swipee_id);

    let outcome = store.transaction(|tx| {
        tx.lock_pair(&pair)?;

        let swipe = tx
            .insert_swipe(&NewSwipe::new(swiper_id, swipee_id, swipe_type))
            .map_err(|e| match e {
                StoreError::Conflict(_) => SwipeError::DuplicateSwipe,
                StoreError::NotFound => SwipeError::UserNotFound,
                other => SwipeError::Store(other),
            })?;

        if swipe_type != SwipeType::Like {
            return Ok(SwipeOutcome { swipe, new_match: None });
        }

        if tx.find_like(swipee_id, swiper_id)?.is_none() {
            return Ok(SwipeOutcome { swipe, new_match: None });
        }

        let new_match = tx.insert_match(&NewMatch::for_pair(swiper_id, swipee_id))?;
        if new_match.is_none() {
            counter!("match_duplicates_total").increment(1);
            tracing::warn!(match_id = %pair, "match already exists for pair, keeping existing row");
        }

        Ok(SwipeOutcome { swipe, new_match })
    })?;

    counter!("swipes_recorded_total", "swipe_type" => swipe_type.as_str()).increment(1);
    if let Some(m) = &outcome.new_match {
        counter!("matches_created_total").increment(1);
        tracing::info!(match_id = %m.id, swiper_id = %swiper_id, swipee_id = %swipee_id, "match created");
    } else {
        tracing::debug!(swiper_id = %swiper_id, swipee_id = %swipee_id, swipe_type = %swipe_type, "swipe recorded");
    }

    Ok(outcome)
}

pub fn swipe_history<S: SwipeStore>(
    store: &S,
    user_id: Uuid,
    page: &PageParams,
) -> Result<Vec<SwipeView>, SwipeError> {
    Ok(store.swipe_history(user_id, page.limit(), page.offset())?)
}

pub fn get_swipe<S: SwipeStore>(store: &S, id: Uuid) -> Result<SwipeView, SwipeError> {
    store.swipe_by_id(id)?.ok_or(SwipeError::SwipeNotFound)
}

pub fn list_matches<S: SwipeStore>(
    store: &S,
    user_id: Uuid,
    active_only: bool,
    page: &PageParams,
) -> Result<Vec<Match>, SwipeError> {
    Ok(store.list_matches(user_id, active_only, page.limit(), page.offset())?)
}

/// Unmatch (or re-match) on behalf of one of the two participants.
pub fn set_match_active<S: SwipeStore>(
    store: &S,
    user_id: Uuid,
    match_id: &str,
    is_active: bool,
) -> Result<Match, SwipeError> {
    let existing = store.find_match(match_id)?.ok_or(SwipeError::MatchNotFound)?;
    if !existing.involves(user_id) {
        return Err(SwipeError::NotParticipant);
    }
    if existing.is_active == is_active {
        return Ok(existing);
    }

    let updated = store.update_match_active(match_id, is_active)?;
    tracing::info!(match_id = %match_id, user_id = %user_id, is_active, "match state changed");
    Ok(updated)
}

/// Email job telling `swipee` that `swiper` completed a match with them.
pub fn match_notification(swiper: &UserSummary, swipee: &UserSummary) -> NotificationJob {
    NotificationJob::new(
        swipee.id,
        swipee.email.clone(),
        MATCH_SUBJECT,
        format!(
            "It's a match! You and @{} both liked each other. Start chatting now!",
            swiper.username
        ),
    )
}
