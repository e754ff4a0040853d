use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use spark_shared::errors::StoreError;
use spark_shared::interests::SYSTEM_INTERESTS;

use crate::index::reseed::ReseedReport;
use crate::services::profile_service::PgProfileSource;
use crate::AppState;

pub async fn reseed_interest_index(state: &AppState) -> Result<ReseedReport, StoreError> {
    let source = PgProfileSource::new(state.db.clone());
    state
        .index
        .reseed_from_profiles(&source, SYSTEM_INTERESTS, state.config.reseed_active_days)
        .await
}

/// Reseeds immediately, then once per `interval`. A failed pass is logged and retried on
/// the next tick.
pub fn spawn_reseed_scheduler(state: Arc<AppState>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = reseed_interest_index(&state).await {
                tracing::error!(error = %e, "scheduled interest index reseed failed");
            }
        }
    })
}
