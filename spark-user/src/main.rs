use axum::{routing::{get, post}, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod index;
mod jobs;
mod models;
mod routes;
mod schema;
mod services;

use config::AppConfig;
use index::redis_store::RedisInterestStore;
use index::{IndexDispatcher, InterestIndex};
use spark_shared::clients::db::{self, DbPool, PoolSettings};
use spark_shared::clients::redis::RedisClient;
use spark_shared::middleware::{init_metrics, init_tracing, metrics_middleware};

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub index: Arc<InterestIndex<RedisInterestStore>>,
    pub dispatcher: IndexDispatcher,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("spark-user");
    let metrics_handle = init_metrics()?;

    let config = AppConfig::load()?;
    let port = config.port;

    let db = db::create_pool(
        &config.database_url,
        &PoolSettings {
            max_size: config.db_pool_size,
            connection_timeout: Duration::from_millis(config.db_connect_timeout_ms),
            ..Default::default()
        },
    )?;

    let redis = RedisClient::connect(&config.redis_url, Duration::from_millis(config.redis_timeout_ms)).await?;
    let index = Arc::new(InterestIndex::new(RedisInterestStore::new(redis)));
    let (dispatcher, _workers) =
        IndexDispatcher::spawn(index.clone(), config.index_workers, config.index_queue_capacity);

    let reseed_interval = Duration::from_secs(config.reseed_interval_secs.max(60));
    let state = Arc::new(AppState { db, config, index, dispatcher, metrics_handle });

    jobs::spawn_reseed_scheduler(state.clone(), reseed_interval);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/profiles", post(routes::profile::create_profile).patch(routes::profile::update_profile))
        .route("/profiles/me", get(routes::profile::get_my_profile))
        .route("/profiles/nearby", get(routes::profile::nearby_profiles))
        .route("/profiles/:id", get(routes::profile::get_profile))
        .route("/profiles/:id/common-interests", get(routes::profile::common_interests))
        .route("/discover", get(routes::discovery::discover))
        .route("/interests", get(routes::interests::list_interests))
        .route("/interests/:tag/members", get(routes::interests::interest_members))
        .route("/interests/:tag/count", get(routes::interests::interest_count))
        .route("/admin/reseed", post(routes::admin::reseed_index))
        // Internal service-to-service endpoints (no auth)
        .route("/internal/activity", post(routes::internal::touch_activity))
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "spark-user starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
