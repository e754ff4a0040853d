use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::Text;
use uuid::Uuid;

use spark_shared::clients::db::DbPool;
use spark_shared::errors::StoreError;

use super::store::{SwipeStore, SwipeTx};
use super::SwipeError;
use crate::models::{Match, NewMatch, NewSwipe, Swipe, SwipeView, UserSummary};
use crate::schema::{matches, swipes, users};

pub struct PgSwipeStore {
    pool: DbPool,
    statement_timeout_ms: u64,
}

impl PgSwipeStore {
    pub fn new(pool: DbPool, statement_timeout_ms: u64) -> Self {
        Self { pool, statement_timeout_ms }
    }

    fn conn(&self) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>, StoreError> {
        Ok(self.pool.get()?)
    }
}

impl SwipeTx for PgConnection {
    fn lock_pair(&mut self, pair_id: &str) -> Result<(), StoreError> {
        diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind::<Text, _>(pair_id)
            .execute(self)?;
        Ok(())
    }

    fn insert_swipe(&mut self, swipe: &NewSwipe) -> Result<Swipe, StoreError> {
        diesel::insert_into(swipes::table)
            .values(swipe)
            .returning(Swipe::as_returning())
            .get_result(self)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => StoreError::NotFound,
                other => StoreError::from(other),
            })
    }

    fn find_like(&mut self, swiper_id: Uuid, swipee_id: Uuid) -> Result<Option<Swipe>, StoreError> {
        Ok(swipes::table
            .filter(swipes::swiper_id.eq(swiper_id))
            .filter(swipes::swipee_id.eq(swipee_id))
            .filter(swipes::swipe_type.eq("like"))
            .filter(swipes::deleted_at.is_null())
            .select(Swipe::as_select())
            .first(self)
            .optional()?)
    }

    fn insert_match(&mut self, new_match: &NewMatch) -> Result<Option<Match>, StoreError> {
        // DO NOTHING keeps the transaction usable; a failed INSERT would abort it.
        Ok(diesel::insert_into(matches::table)
            .values(new_match)
            .on_conflict(matches::id)
            .do_nothing()
            .returning(Match::as_returning())
            .get_result(self)
            .optional()?)
    }
}

impl SwipeStore for PgSwipeStore {
    fn transaction<T, F>(&self, f: F) -> Result<T, SwipeError>
    where
        F: FnOnce(&mut dyn SwipeTx) -> Result<T, SwipeError>,
    {
        let mut pooled = self.conn()?;
        let conn: &mut PgConnection = &mut pooled;
        conn.transaction::<T, SwipeError, _>(|conn| {
            diesel::sql_query(format!("SET LOCAL statement_timeout = {}", self.statement_timeout_ms))
                .execute(conn)?;
            f(conn)
        })
    }

    fn swipe_history(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<SwipeView>, StoreError> {
        let mut conn = self.conn()?;

        let rows = swipes::table
            .inner_join(users::table.on(users::id.eq(swipes::swipee_id)))
            .filter(swipes::swiper_id.eq(user_id))
            .filter(swipes::deleted_at.is_null())
            .order((swipes::created_at.desc(), swipes::id.desc()))
            .limit(limit)
            .offset(offset)
            .select((Swipe::as_select(), UserSummary::as_select()))
            .load::<(Swipe, UserSummary)>(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|(swipe, swipee)| SwipeView { swipe, swiper: None, swipee: Some(swipee) })
            .collect())
    }

    fn swipe_by_id(&self, id: Uuid) -> Result<Option<SwipeView>, StoreError> {
        let mut conn = self.conn()?;

        let Some(swipe) = swipes::table
            .find(id)
            .filter(swipes::deleted_at.is_null())
            .select(Swipe::as_select())
            .first(&mut conn)
            .optional()?
        else {
            return Ok(None);
        };

        let parties = users::table
            .filter(users::id.eq_any(vec![swipe.swiper_id, swipe.swipee_id]))
            .select(UserSummary::as_select())
            .load::<UserSummary>(&mut conn)?;

        let find = |id: Uuid| parties.iter().find(|u| u.id == id).cloned();
        Ok(Some(SwipeView {
            swiper: find(swipe.swiper_id),
            swipee: find(swipe.swipee_id),
            swipe,
        }))
    }

    fn list_matches(
        &self,
        user_id: Uuid,
        active_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Match>, StoreError> {
        let mut conn = self.conn()?;

        let mut query = matches::table
            .filter(matches::user1_id.eq(user_id).or(matches::user2_id.eq(user_id)))
            .filter(matches::deleted_at.is_null())
            .order((matches::created_at.desc(), matches::id.desc()))
            .limit(limit)
            .offset(offset)
            .select(Match::as_select())
            .into_boxed();

        if active_only {
            query = query.filter(matches::is_active.eq(true));
        }

        Ok(query.load(&mut conn)?)
    }

    fn find_match(&self, id: &str) -> Result<Option<Match>, StoreError> {
        let mut conn = self.conn()?;
        Ok(matches::table
            .find(id)
            .filter(matches::deleted_at.is_null())
            .select(Match::as_select())
            .first(&mut conn)
            .optional()?)
    }

    fn update_match_active(&self, id: &str, is_active: bool) -> Result<Match, StoreError> {
        let mut conn = self.conn()?;
        Ok(diesel::update(matches::table.find(id))
            .set((matches::is_active.eq(is_active), matches::updated_at.eq(Utc::now())))
            .returning(Match::as_returning())
            .get_result(&mut conn)?)
    }

    fn users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, StoreError> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::id.eq_any(ids.to_vec()))
            .filter(users::deleted_at.is_null())
            .select(UserSummary::as_select())
            .load(&mut conn)?)
    }
}
