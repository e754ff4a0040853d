use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Condvar, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use spark_shared::errors::StoreError;

use super::store::{SwipeStore, SwipeTx};
use super::SwipeError;
use crate::models::{Match, NewMatch, NewSwipe, Swipe, SwipeView, UserSummary};

#[derive(Default)]
struct Tables {
    users: Vec<UserSummary>,
    swipes: Vec<Swipe>,
    matches: BTreeMap<String, Match>,
}

/// Store double with read-committed visibility and per-pair locks, so engine races play out
/// the way they do against PostgreSQL.
#[derive(Default)]
pub struct MemorySwipeStore {
    committed: Mutex<Tables>,
    held_pairs: Mutex<HashSet<String>>,
    pair_released: Condvar,
    fail_next_lookup: Mutex<Option<StoreError>>,
    last_history_limit: Mutex<Option<i64>>,
    clock: AtomicI64,
}

impl MemorySwipeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, username: &str) -> Uuid {
        let user = UserSummary {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
        };
        let id = user.id;
        self.committed.lock().unwrap().users.push(user);
        id
    }

    pub fn seed_match(&self, new_match: NewMatch, is_active: bool) {
        let m = Match {
            id: new_match.id.clone(),
            user1_id: new_match.user1_id,
            user2_id: new_match.user2_id,
            is_active,
            created_at: self.tick(),
            updated_at: self.tick(),
            deleted_at: None,
        };
        self.committed.lock().unwrap().matches.insert(m.id.clone(), m);
    }

    /// The next `find_like` fails with `err`.
    pub fn fail_next_lookup(&self, err: StoreError) {
        *self.fail_next_lookup.lock().unwrap() = Some(err);
    }

    pub fn swipe_count(&self) -> usize {
        self.committed.lock().unwrap().swipes.len()
    }

    pub fn match_count(&self) -> usize {
        self.committed.lock().unwrap().matches.len()
    }

    pub fn last_history_limit(&self) -> Option<i64> {
        *self.last_history_limit.lock().unwrap()
    }

    /// Strictly increasing timestamps keep ordering assertions deterministic.
    fn tick(&self) -> DateTime<Utc> {
        let n = self.clock.fetch_add(1, Ordering::SeqCst);
        Utc.timestamp_opt(1_700_000_000 + n, 0).unwrap()
    }

    fn view(tables: &Tables, swipe: &Swipe) -> SwipeView {
        let find = |id: Uuid| tables.users.iter().find(|u| u.id == id).cloned();
        SwipeView {
            swiper: find(swipe.swiper_id),
            swipee: find(swipe.swipee_id),
            swipe: swipe.clone(),
        }
    }
}

struct MemoryTx<'a> {
    store: &'a MemorySwipeStore,
    swipes: Vec<Swipe>,
    matches: Vec<Match>,
    locked: Vec<String>,
}

impl MemoryTx<'_> {
    fn commit(&self) -> Result<(), SwipeError> {
        let mut tables = self.store.committed.lock().unwrap();
        for s in &self.swipes {
            if tables.swipes.iter().any(|c| c.swiper_id == s.swiper_id && c.swipee_id == s.swipee_id) {
                return Err(SwipeError::DuplicateSwipe);
            }
        }
        for m in &self.matches {
            if tables.matches.contains_key(&m.id) {
                return Err(SwipeError::Store(StoreError::Conflict(m.id.clone())));
            }
        }
        tables.swipes.extend(self.swipes.iter().cloned());
        for m in &self.matches {
            tables.matches.insert(m.id.clone(), m.clone());
        }
        Ok(())
    }
}

impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        if self.locked.is_empty() {
            return;
        }
        let mut held = self.store.held_pairs.lock().unwrap();
        for pair in &self.locked {
            held.remove(pair);
        }
        self.store.pair_released.notify_all();
    }
}

impl SwipeTx for MemoryTx<'_> {
    fn lock_pair(&mut self, pair_id: &str) -> Result<(), StoreError> {
        let mut held = self.store.held_pairs.lock().unwrap();
        while held.contains(pair_id) {
            held = self.store.pair_released.wait(held).unwrap();
        }
        held.insert(pair_id.to_string());
        self.locked.push(pair_id.to_string());
        Ok(())
    }

    fn insert_swipe(&mut self, new: &NewSwipe) -> Result<Swipe, StoreError> {
        let tables = self.store.committed.lock().unwrap();
        let known = |id: Uuid| tables.users.iter().any(|u| u.id == id);
        if !known(new.swiper_id) || !known(new.swipee_id) {
            return Err(StoreError::NotFound);
        }
        let same_direction = |s: &Swipe| s.swiper_id == new.swiper_id && s.swipee_id == new.swipee_id;
        if tables.swipes.iter().any(same_direction) || self.swipes.iter().any(same_direction) {
            return Err(StoreError::Conflict("swipes_swiper_swipee_key".into()));
        }
        drop(tables);

        let swipe = Swipe {
            id: new.id,
            swiper_id: new.swiper_id,
            swipee_id: new.swipee_id,
            swipe_type: new.swipe_type.clone(),
            created_at: self.store.tick(),
            deleted_at: None,
        };
        self.swipes.push(swipe.clone());
        Ok(swipe)
    }

    fn find_like(&mut self, swiper_id: Uuid, swipee_id: Uuid) -> Result<Option<Swipe>, StoreError> {
        if let Some(err) = self.store.fail_next_lookup.lock().unwrap().take() {
            return Err(err);
        }
        let tables = self.store.committed.lock().unwrap();
        Ok(tables
            .swipes
            .iter()
            .chain(self.swipes.iter())
            .find(|s| s.swiper_id == swiper_id && s.swipee_id == swipee_id && s.is_like() && s.deleted_at.is_none())
            .cloned())
    }

    fn insert_match(&mut self, new: &NewMatch) -> Result<Option<Match>, StoreError> {
        let exists = self.store.committed.lock().unwrap().matches.contains_key(&new.id)
            || self.matches.iter().any(|m| m.id == new.id);
        if exists {
            return Ok(None);
        }
        let now = self.store.tick();
        let m = Match {
            id: new.id.clone(),
            user1_id: new.user1_id,
            user2_id: new.user2_id,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.matches.push(m.clone());
        Ok(Some(m))
    }
}

impl SwipeStore for MemorySwipeStore {
    fn transaction<T, F>(&self, f: F) -> Result<T, SwipeError>
    where
        F: FnOnce(&mut dyn SwipeTx) -> Result<T, SwipeError>,
    {
        let mut tx = MemoryTx { store: self, swipes: vec![], matches: vec![], locked: vec![] };
        let value = f(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn swipe_history(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<SwipeView>, StoreError> {
        *self.last_history_limit.lock().unwrap() = Some(limit);
        let tables = self.committed.lock().unwrap();
        let mut mine: Vec<&Swipe> = tables
            .swipes
            .iter()
            .filter(|s| s.swiper_id == user_id && s.deleted_at.is_none())
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(mine
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|s| {
                let mut view = Self::view(&tables, s);
                view.swiper = None;
                view
            })
            .collect())
    }

    fn swipe_by_id(&self, id: Uuid) -> Result<Option<SwipeView>, StoreError> {
        let tables = self.committed.lock().unwrap();
        Ok(tables.swipes.iter().find(|s| s.id == id).map(|s| Self::view(&tables, s)))
    }

    fn list_matches(
        &self,
        user_id: Uuid,
        active_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Match>, StoreError> {
        let tables = self.committed.lock().unwrap();
        let mut found: Vec<Match> = tables
            .matches
            .values()
            .filter(|m| m.involves(user_id) && (!active_only || m.is_active))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    fn find_match(&self, id: &str) -> Result<Option<Match>, StoreError> {
        Ok(self.committed.lock().unwrap().matches.get(id).cloned())
    }

    fn update_match_active(&self, id: &str, is_active: bool) -> Result<Match, StoreError> {
        let now = self.tick();
        let mut tables = self.committed.lock().unwrap();
        let m = tables.matches.get_mut(id).ok_or(StoreError::NotFound)?;
        m.is_active = is_active;
        m.updated_at = now;
        Ok(m.clone())
    }

    fn users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, StoreError> {
        let tables = self.committed.lock().unwrap();
        Ok(tables.users.iter().filter(|u| ids.contains(&u.id)).cloned().collect())
    }
}
