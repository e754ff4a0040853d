use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{InterestIndex, InterestStore};

/// A change to push into the interest index after a profile write committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexUpdate {
    Add { user_id: Uuid, tags: Vec<String> },
    Replace { user_id: Uuid, old: Vec<String>, new: Vec<String> },
}

impl IndexUpdate {
    pub fn user_id(&self) -> Uuid {
        match self {
            IndexUpdate::Add { user_id, .. } | IndexUpdate::Replace { user_id, .. } => *user_id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            IndexUpdate::Add { .. } => "add",
            IndexUpdate::Replace { .. } => "replace",
        }
    }
}

/// Handle to the bounded pool of index workers. Each user is pinned to one worker so that
/// updates for the same user apply in dispatch order. Cloning shares the same queues.
#[derive(Clone)]
pub struct IndexDispatcher {
    shards: Vec<mpsc::Sender<IndexUpdate>>,
}

impl IndexDispatcher {
    /// Starts `workers` tasks, each draining its own queue; `capacity` is split between them.
    /// The tasks exit once every dispatcher handle is dropped and their queue is empty.
    pub fn spawn<S>(
        index: Arc<InterestIndex<S>>,
        workers: usize,
        capacity: usize,
    ) -> (Self, Vec<JoinHandle<()>>)
    where
        S: InterestStore + 'static,
    {
        let workers = workers.max(1);
        let per_worker = (capacity / workers).max(1);

        let mut shards = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let (tx, mut rx) = mpsc::channel::<IndexUpdate>(per_worker);
            let index = index.clone();
            shards.push(tx);
            handles.push(tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    apply_update(&index, update).await;
                }
                tracing::debug!(worker, "index worker stopped");
            }));
        }

        tracing::info!(workers, capacity, "interest index dispatcher started");
        (Self { shards }, handles)
    }

    fn shard_for(&self, user_id: Uuid) -> &mpsc::Sender<IndexUpdate> {
        let slot = (user_id.as_u128() % self.shards.len() as u128) as usize;
        &self.shards[slot]
    }

    /// Queues `update` without waiting. Returns false if it had to be dropped; the next
    /// reseed repairs whatever was lost.
    pub fn dispatch(&self, update: IndexUpdate) -> bool {
        match self.shard_for(update.user_id()).try_send(update) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(update)) => {
                counter!("interest_index_updates_dropped_total").increment(1);
                tracing::warn!(
                    user_id = %update.user_id(),
                    kind = update.kind(),
                    "interest index queue full, update dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(update)) => {
                counter!("interest_index_updates_dropped_total").increment(1);
                tracing::warn!(user_id = %update.user_id(), "interest index workers stopped, update dropped");
                false
            }
        }
    }
}

async fn apply_update<S: InterestStore>(index: &InterestIndex<S>, update: IndexUpdate) {
    let user_id = update.user_id();
    let kind = update.kind();

    let result = match &update {
        IndexUpdate::Add { user_id, tags } => index.add_user_interests(*user_id, tags).await,
        IndexUpdate::Replace { user_id, old, new } => {
            index.replace_user_interests(*user_id, old, new).await
        }
    };

    match result {
        Ok(()) => tracing::debug!(user_id = %user_id, kind, "interest index updated"),
        Err(e) => {
            counter!("interest_index_update_failures_total").increment(1);
            tracing::warn!(user_id = %user_id, kind, error = %e, "interest index update failed");
        }
    }
}
