use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use spark_shared::errors::StoreError;

use super::store::{InterestStore, SetOp};

/// In-process stand-in for Redis sets.
#[derive(Default)]
pub struct MemoryInterestStore {
    sets: RwLock<HashMap<String, BTreeSet<String>>>,
    unavailable: AtomicBool,
}

impl MemoryInterestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with a transient error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sets.read().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Transient("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl InterestStore for MemoryInterestStore {
    async fn members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check()?;
        let sets = self.sets.read().unwrap();
        Ok(sets.get(key).map(|s| s.iter().cloned().collect()).unwrap_or_default())
    }

    async fn cardinality(&self, key: &str) -> Result<u64, StoreError> {
        self.check()?;
        Ok(self.sets.read().unwrap().get(key).map_or(0, |s| s.len() as u64))
    }

    async fn intersect(&self, keys: &[String]) -> Result<Vec<String>, StoreError> {
        self.check()?;
        let sets = self.sets.read().unwrap();
        let mut iter = keys.iter();
        let Some(first) = iter.next() else { return Ok(vec![]) };
        let mut acc = sets.get(first).cloned().unwrap_or_default();
        for key in iter {
            let other = sets.get(key).cloned().unwrap_or_default();
            acc = acc.intersection(&other).cloned().collect();
        }
        Ok(acc.into_iter().collect())
    }

    async fn union(&self, keys: &[String]) -> Result<Vec<String>, StoreError> {
        self.check()?;
        let sets = self.sets.read().unwrap();
        let acc: BTreeSet<String> = keys
            .iter()
            .filter_map(|k| sets.get(k))
            .flat_map(|s| s.iter().cloned())
            .collect();
        Ok(acc.into_iter().collect())
    }

    async fn apply(&self, ops: Vec<SetOp>) -> Result<(), StoreError> {
        self.check()?;
        let mut sets = self.sets.write().unwrap();
        for op in ops {
            match op {
                SetOp::Add { key, members } => {
                    if !members.is_empty() {
                        sets.entry(key).or_default().extend(members);
                    }
                }
                SetOp::Remove { key, members } => {
                    if let Some(set) = sets.get_mut(&key) {
                        for m in &members {
                            set.remove(m);
                        }
                        if set.is_empty() {
                            sets.remove(&key);
                        }
                    }
                }
                SetOp::Delete { key } => {
                    sets.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}
