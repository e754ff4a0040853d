use async_trait::async_trait;

use spark_shared::clients::redis::RedisClient;
use spark_shared::errors::StoreError;

use super::store::{InterestStore, SetOp};

pub struct RedisInterestStore {
    redis: RedisClient,
}

impl RedisInterestStore {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl InterestStore for RedisInterestStore {
    async fn members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.redis.smembers(key).await
    }

    async fn members_many(&self, keys: &[String]) -> Vec<Option<Vec<String>>> {
        match self.redis.smembers_many(keys).await {
            Ok(sets) => sets.into_iter().map(Some).collect(),
            Err(e) => {
                // A single bad key fails the whole pipeline; retry key by key to isolate it.
                tracing::debug!(error = %e, keys = keys.len(), "pipelined SMEMBERS failed, falling back");
                let mut out = Vec::with_capacity(keys.len());
                for key in keys {
                    out.push(self.redis.smembers(key).await.ok());
                }
                out
            }
        }
    }

    async fn cardinality(&self, key: &str) -> Result<u64, StoreError> {
        self.redis.scard(key).await
    }

    async fn intersect(&self, keys: &[String]) -> Result<Vec<String>, StoreError> {
        self.redis.sinter(keys).await
    }

    async fn union(&self, keys: &[String]) -> Result<Vec<String>, StoreError> {
        self.redis.sunion(keys).await
    }

    async fn apply(&self, ops: Vec<SetOp>) -> Result<(), StoreError> {
        let mut pipe = redis::pipe();
        let mut queued = 0usize;
        for op in &ops {
            match op {
                SetOp::Add { key, members } if !members.is_empty() => {
                    pipe.sadd(key.as_str(), members.as_slice()).ignore();
                }
                SetOp::Remove { key, members } if !members.is_empty() => {
                    pipe.srem(key.as_str(), members.as_slice()).ignore();
                }
                SetOp::Delete { key } => {
                    pipe.del(key.as_str()).ignore();
                }
                _ => continue,
            }
            queued += 1;
        }
        if queued == 0 {
            return Ok(());
        }
        self.redis.exec_atomic(&mut pipe).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.redis.ping().await
    }
}
