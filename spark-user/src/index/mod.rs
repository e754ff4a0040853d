//! Bidirectional user ↔ interest index kept in Redis sets.
//!
//! `interests:user:{id}` holds a user's tags and `interests:{tag}` holds the users carrying
//! that tag. Both sides are always written in the same atomic batch so they stay exact
//! inverses. The index is a projection of `profiles.interests` and can be rebuilt with
//! [`reseed`].

pub mod dispatcher;
pub mod redis_store;
pub mod reseed;
pub mod store;

#[cfg(test)]
pub mod memory;

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use spark_shared::errors::StoreError;

pub use dispatcher::{IndexDispatcher, IndexUpdate};
pub use store::{tag_key, user_key, InterestStore, SetOp};

const DEFAULT_CANDIDATE_LIMIT: i64 = 100;

pub struct InterestIndex<S> {
    store: S,
}

impl<S: InterestStore> InterestIndex<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn user_interests(&self, user_id: Uuid) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.store.members(&user_key(&user_id)).await?.into_iter().collect())
    }

    pub async fn add_user_interests(&self, user_id: Uuid, tags: &[String]) -> Result<(), StoreError> {
        if tags.is_empty() {
            return Ok(());
        }
        let member = vec![user_id.to_string()];
        let mut ops = vec![SetOp::Add { key: user_key(&user_id), members: tags.to_vec() }];
        ops.extend(tags.iter().map(|t| SetOp::Add { key: tag_key(t), members: member.clone() }));
        self.store.apply(ops).await
    }

    pub async fn remove_user_interests(&self, user_id: Uuid, tags: &[String]) -> Result<(), StoreError> {
        if tags.is_empty() {
            return Ok(());
        }
        let member = vec![user_id.to_string()];
        let mut ops = vec![SetOp::Remove { key: user_key(&user_id), members: tags.to_vec() }];
        ops.extend(tags.iter().map(|t| SetOp::Remove { key: tag_key(t), members: member.clone() }));
        self.store.apply(ops).await
    }

    /// Swaps `old` for `new` in one batch: the user's set ends up exactly `new`, and the user
    /// leaves every bucket in `old` that is not also in `new`.
    pub async fn replace_user_interests(
        &self,
        user_id: Uuid,
        old: &[String],
        new: &[String],
    ) -> Result<(), StoreError> {
        self.store.apply(replace_ops(user_id, old, new)).await
    }

    pub async fn common_interests(&self, a: Uuid, b: Uuid) -> Result<BTreeSet<String>, StoreError> {
        let keys = [user_key(&a), user_key(&b)];
        Ok(self.store.intersect(&keys).await?.into_iter().collect())
    }

    /// Users sharing at least one of `tags`, excluding `user_id`, sorted by id and capped at
    /// `limit` (non-positive means 100).
    pub async fn users_with_any_interest(
        &self,
        user_id: Uuid,
        tags: &[String],
        limit: i64,
    ) -> Result<Vec<Uuid>, StoreError> {
        if tags.is_empty() {
            return Ok(vec![]);
        }
        let limit = (if limit <= 0 { DEFAULT_CANDIDATE_LIMIT } else { limit }) as usize;

        let keys: Vec<String> = tags.iter().map(|t| tag_key(t)).collect();
        let mut users: Vec<Uuid> = self
            .store
            .union(&keys)
            .await?
            .iter()
            .filter_map(|m| Uuid::parse_str(m).ok())
            .filter(|id| *id != user_id)
            .collect();
        users.sort();
        users.truncate(limit);
        Ok(users)
    }

    pub async fn interest_bucket(&self, tag: &str) -> Result<Vec<Uuid>, StoreError> {
        let mut users: Vec<Uuid> = self
            .store
            .members(&tag_key(tag))
            .await?
            .iter()
            .filter_map(|m| Uuid::parse_str(m).ok())
            .collect();
        users.sort();
        Ok(users)
    }

    pub async fn interest_bucket_size(&self, tag: &str) -> Result<u64, StoreError> {
        self.store.cardinality(&tag_key(tag)).await
    }

    /// Interests for each user; users whose set could not be read are left out.
    pub async fn many_user_interests(&self, user_ids: &[Uuid]) -> HashMap<Uuid, BTreeSet<String>> {
        let keys: Vec<String> = user_ids.iter().map(user_key).collect();
        let sets = self.store.members_many(&keys).await;

        user_ids
            .iter()
            .zip(sets)
            .filter_map(|(id, set)| set.map(|s| (*id, s.into_iter().collect())))
            .collect()
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }
}

pub(crate) fn replace_ops(user_id: Uuid, old: &[String], new: &[String]) -> Vec<SetOp> {
    let member = vec![user_id.to_string()];
    let new_set: BTreeSet<&String> = new.iter().collect();

    let mut ops = vec![SetOp::Delete { key: user_key(&user_id) }];
    ops.extend(
        old.iter()
            .filter(|t| !new_set.contains(t))
            .map(|t| SetOp::Remove { key: tag_key(t), members: member.clone() }),
    );
    if !new.is_empty() {
        ops.push(SetOp::Add { key: user_key(&user_id), members: new.to_vec() });
        ops.extend(new.iter().map(|t| SetOp::Add { key: tag_key(t), members: member.clone() }));
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryInterestStore;
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    fn set(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    fn index() -> InterestIndex<MemoryInterestStore> {
        InterestIndex::new(MemoryInterestStore::new())
    }

    #[tokio::test]
    async fn added_interests_read_back_and_populate_buckets() {
        let index = index();
        let u = Uuid::new_v4();
        index.add_user_interests(u, &tags(&["Art", "Gym"])).await.unwrap();

        assert_eq!(index.user_interests(u).await.unwrap(), set(&["Art", "Gym"]));
        assert_eq!(index.interest_bucket("Art").await.unwrap(), vec![u]);
        assert_eq!(index.interest_bucket("Gym").await.unwrap(), vec![u]);
    }

    #[tokio::test]
    async fn replace_moves_user_between_buckets() {
        let index = index();
        let u = Uuid::new_v4();
        index.add_user_interests(u, &tags(&["Gym", "Art"])).await.unwrap();

        index
            .replace_user_interests(u, &tags(&["Gym", "Art"]), &tags(&["Art", "Travel"]))
            .await
            .unwrap();

        assert_eq!(index.user_interests(u).await.unwrap(), set(&["Art", "Travel"]));
        assert!(index.interest_bucket("Gym").await.unwrap().is_empty());
        assert_eq!(index.interest_bucket("Art").await.unwrap(), vec![u]);
        assert_eq!(index.interest_bucket("Travel").await.unwrap(), vec![u]);
    }

    #[tokio::test]
    async fn replace_with_empty_set_clears_user() {
        let index = index();
        let u = Uuid::new_v4();
        index.add_user_interests(u, &tags(&["Music"])).await.unwrap();
        index.replace_user_interests(u, &tags(&["Music"]), &[]).await.unwrap();

        assert!(index.user_interests(u).await.unwrap().is_empty());
        assert_eq!(index.interest_bucket_size("Music").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_drops_only_named_tags() {
        let index = index();
        let u = Uuid::new_v4();
        index.add_user_interests(u, &tags(&["Art", "Gym", "Yoga"])).await.unwrap();
        index.remove_user_interests(u, &tags(&["Gym"])).await.unwrap();

        assert_eq!(index.user_interests(u).await.unwrap(), set(&["Art", "Yoga"]));
        assert!(index.interest_bucket("Gym").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn common_interests_is_the_intersection() {
        let index = index();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        index.add_user_interests(a, &tags(&["Art", "Gym", "Hiking"])).await.unwrap();
        index.add_user_interests(b, &tags(&["Hiking", "Art", "Cooking"])).await.unwrap();

        assert_eq!(index.common_interests(a, b).await.unwrap(), set(&["Art", "Hiking"]));
    }

    #[tokio::test]
    async fn empty_tag_list_yields_no_candidates() {
        let index = index();
        let u = Uuid::new_v4();
        assert!(index.users_with_any_interest(u, &[], 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn candidates_exclude_self_are_sorted_and_capped() {
        let index = index();
        let me = Uuid::new_v4();
        index.add_user_interests(me, &tags(&["Art"])).await.unwrap();

        let mut others: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for (i, id) in others.iter().enumerate() {
            let tag = if i % 2 == 0 { "Art" } else { "Gym" };
            index.add_user_interests(*id, &tags(&[tag])).await.unwrap();
        }
        others.sort();

        let found = index.users_with_any_interest(me, &tags(&["Art", "Gym"]), 0).await.unwrap();
        assert_eq!(found, others);

        let capped = index.users_with_any_interest(me, &tags(&["Art", "Gym"]), 2).await.unwrap();
        assert_eq!(capped, others[..2].to_vec());
    }

    #[tokio::test]
    async fn many_user_interests_maps_each_user() {
        let index = index();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        index.add_user_interests(a, &tags(&["Art"])).await.unwrap();
        index.add_user_interests(b, &tags(&["Gym", "Yoga"])).await.unwrap();

        let map = index.many_user_interests(&[a, b, c]).await;
        assert_eq!(map[&a], set(&["Art"]));
        assert_eq!(map[&b], set(&["Gym", "Yoga"]));
        assert!(map[&c].is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_surfaces_transient_error() {
        let index = index();
        index.store().set_unavailable(true);
        let err = index.user_interests(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(index.many_user_interests(&[Uuid::new_v4()]).await.is_empty());
    }

    #[test]
    fn replace_ops_keep_shared_tags_in_their_buckets() {
        let u = Uuid::new_v4();
        let ops = replace_ops(u, &tags(&["Gym", "Art"]), &tags(&["Art"]));
        assert!(ops.contains(&SetOp::Remove { key: tag_key("Gym"), members: vec![u.to_string()] }));
        assert!(!ops.contains(&SetOp::Remove { key: tag_key("Art"), members: vec![u.to_string()] }));
        assert_eq!(ops[0], SetOp::Delete { key: user_key(&u) });
    }
}
