use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use spark_shared::errors::StoreError;

use super::{tag_key, user_key, InterestIndex, InterestStore, SetOp};

pub const RESEED_BATCH_SIZE: i64 = 100;

/// A user's stored interests as read from the profile table.
#[derive(Debug, Clone)]
pub struct ProfileInterests {
    pub user_id: Uuid,
    pub interests: Vec<String>,
}

/// Keyset-paged read of profiles whose owner was active since `active_since`,
/// ordered by `user_id` and starting strictly after `after`.
pub trait ProfileSource: Send + Sync {
    fn active_profile_interests(
        &self,
        active_since: DateTime<Utc>,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<ProfileInterests>, StoreError>;
}

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct ReseedReport {
    pub batches: u64,
    pub users: u64,
    pub skipped_tags: u64,
}

impl<S: InterestStore> InterestIndex<S> {
    /// Rebuilds the index entries of every recently active user from `source`.
    ///
    /// Each batch is written atomically: stale bucket memberships are removed and the user's
    /// set is cleared and rebuilt. Tags outside `vocabulary` are skipped. The first failed
    /// batch aborts the pass; batches already written stay written.
    pub async fn reseed_from_profiles(
        &self,
        source: &dyn ProfileSource,
        vocabulary: &[&str],
        active_within_days: i64,
    ) -> Result<ReseedReport, StoreError> {
        let vocabulary: HashSet<&str> = vocabulary.iter().copied().collect();
        let active_since = Utc::now() - Duration::days(active_within_days.max(0));
        let mut report = ReseedReport::default();
        let mut after = None;

        loop {
            let batch = source.active_profile_interests(active_since, after, RESEED_BATCH_SIZE)?;
            let Some(last) = batch.last() else { break };
            after = Some(last.user_id);

            let mut ops = Vec::new();
            for profile in &batch {
                let (valid, skipped): (Vec<String>, Vec<String>) = profile
                    .interests
                    .iter()
                    .cloned()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .partition(|t| vocabulary.contains(t.as_str()));
                if !skipped.is_empty() {
                    tracing::debug!(user_id = %profile.user_id, skipped = ?skipped, "skipping tags outside vocabulary");
                }
                report.skipped_tags += skipped.len() as u64;

                let current = self.store.members(&user_key(&profile.user_id)).await?;
                ops.extend(rebuild_ops(profile.user_id, &current, &valid));
            }

            self.store.apply(ops).await?;

            report.batches += 1;
            report.users += batch.len() as u64;
            counter!("interest_reseed_batches_total").increment(1);
            tracing::debug!(batch = report.batches, users = batch.len(), "reseed batch applied");

            if (batch.len() as i64) < RESEED_BATCH_SIZE {
                break;
            }
        }

        tracing::info!(
            batches = report.batches,
            users = report.users,
            skipped_tags = report.skipped_tags,
            "interest index reseeded"
        );
        Ok(report)
    }
}

fn rebuild_ops(user_id: Uuid, current: &[String], valid: &[String]) -> Vec<SetOp> {
    let member = vec![user_id.to_string()];
    let keep: HashSet<&String> = valid.iter().collect();

    let mut ops: Vec<SetOp> = current
        .iter()
        .filter(|t| !keep.contains(t))
        .map(|t| SetOp::Remove { key: tag_key(t), members: member.clone() })
        .collect();
    ops.push(SetOp::Delete { key: user_key(&user_id) });
    if !valid.is_empty() {
        ops.push(SetOp::Add { key: user_key(&user_id), members: valid.to_vec() });
        ops.extend(valid.iter().map(|t| SetOp::Add { key: tag_key(t), members: member.clone() }));
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::MemoryInterestStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct VecSource {
        profiles: Vec<ProfileInterests>,
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
        afters: Mutex<Vec<Option<Uuid>>>,
    }

    impl VecSource {
        fn new(mut profiles: Vec<ProfileInterests>) -> Self {
            profiles.sort_by_key(|p| p.user_id);
            Self { profiles, calls: AtomicUsize::new(0), fail_on_call: None, afters: Mutex::new(vec![]) }
        }
    }

    impl ProfileSource for VecSource {
        fn active_profile_interests(
            &self,
            _active_since: DateTime<Utc>,
            after: Option<Uuid>,
            limit: i64,
        ) -> Result<Vec<ProfileInterests>, StoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call) {
                return Err(StoreError::Transient("canceling statement due to statement timeout".into()));
            }
            self.afters.lock().unwrap().push(after);
            Ok(self
                .profiles
                .iter()
                .filter(|p| after.map_or(true, |a| p.user_id > a))
                .take(limit as usize)
                .cloned()
                .collect())
        }
    }

    fn profile(tags: &[&str]) -> ProfileInterests {
        ProfileInterests { user_id: Uuid::new_v4(), interests: tags.iter().map(|t| t.to_string()).collect() }
    }

    const VOCAB: &[&str] = &["Art", "Gym", "Travel", "Music"];

    #[tokio::test]
    async fn reseed_rebuilds_stale_entries() {
        let index = InterestIndex::new(MemoryInterestStore::new());
        let p = profile(&["Art", "Travel"]);
        index.add_user_interests(p.user_id, &["Gym".to_string(), "Art".to_string()]).await.unwrap();

        let source = VecSource::new(vec![p.clone()]);
        let report = index.reseed_from_profiles(&source, VOCAB, 30).await.unwrap();

        assert_eq!(report, ReseedReport { batches: 1, users: 1, skipped_tags: 0 });
        let tags: Vec<String> = index.user_interests(p.user_id).await.unwrap().into_iter().collect();
        assert_eq!(tags, vec!["Art".to_string(), "Travel".to_string()]);
        assert!(index.interest_bucket("Gym").await.unwrap().is_empty());
        assert_eq!(index.interest_bucket("Travel").await.unwrap(), vec![p.user_id]);
    }

    #[tokio::test]
    async fn tags_outside_vocabulary_are_skipped() {
        let index = InterestIndex::new(MemoryInterestStore::new());
        let p = profile(&["Art", "Knitting"]);
        let source = VecSource::new(vec![p.clone()]);

        let report = index.reseed_from_profiles(&source, VOCAB, 30).await.unwrap();
        assert_eq!(report.skipped_tags, 1);
        assert_eq!(index.interest_bucket_size("Knitting").await.unwrap(), 0);
        assert_eq!(index.interest_bucket("Art").await.unwrap(), vec![p.user_id]);
    }

    #[tokio::test]
    async fn pages_through_every_batch_with_keyset() {
        let index = InterestIndex::new(MemoryInterestStore::new());
        let profiles: Vec<ProfileInterests> = (0..250).map(|_| profile(&["Music"])).collect();
        let source = VecSource::new(profiles);

        let report = index.reseed_from_profiles(&source, VOCAB, 30).await.unwrap();
        assert_eq!(report.batches, 3);
        assert_eq!(report.users, 250);
        assert_eq!(index.interest_bucket_size("Music").await.unwrap(), 250);

        let afters = source.afters.lock().unwrap().clone();
        assert_eq!(afters[0], None);
        assert_eq!(afters[1], Some(source.profiles[99].user_id));
        assert_eq!(afters[2], Some(source.profiles[199].user_id));
    }

    #[tokio::test]
    async fn failed_batch_aborts_the_pass() {
        let index = InterestIndex::new(MemoryInterestStore::new());
        let profiles: Vec<ProfileInterests> = (0..150).map(|_| profile(&["Gym"])).collect();
        let mut source = VecSource::new(profiles);
        source.fail_on_call = Some(1);

        let err = index.reseed_from_profiles(&source, VOCAB, 30).await.unwrap_err();
        assert!(err.is_transient());
        // The first batch was already committed.
        assert_eq!(index.interest_bucket_size("Gym").await.unwrap(), 100);
    }

    #[tokio::test]
    async fn empty_source_is_a_no_op() {
        let index = InterestIndex::new(MemoryInterestStore::new());
        let source = VecSource::new(vec![]);
        let report = index.reseed_from_profiles(&source, VOCAB, 30).await.unwrap();
        assert_eq!(report, ReseedReport::default());
        assert!(index.store().keys().is_empty());
    }
}
