use async_trait::async_trait;
use uuid::Uuid;

use spark_shared::errors::StoreError;

pub fn user_key(user_id: &Uuid) -> String {
    format!("interests:user:{user_id}")
}

pub fn tag_key(tag: &str) -> String {
    format!("interests:{tag}")
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOp {
    Add { key: String, members: Vec<String> },
    Remove { key: String, members: Vec<String> },
    Delete { key: String },
}

/// Set storage behind the interest index. Batches passed to `apply` land all-or-nothing.
#[async_trait]
pub trait InterestStore: Send + Sync {
    async fn members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Members of every key; `None` where that key could not be read.
    async fn members_many(&self, keys: &[String]) -> Vec<Option<Vec<String>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.members(key).await.ok());
        }
        out
    }

    async fn cardinality(&self, key: &str) -> Result<u64, StoreError>;

    async fn intersect(&self, keys: &[String]) -> Result<Vec<String>, StoreError>;

    async fn union(&self, keys: &[String]) -> Result<Vec<String>, StoreError>;

    async fn apply(&self, ops: Vec<SetOp>) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
