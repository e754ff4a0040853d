use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod engine;
mod events;
mod models;
mod routes;
mod schema;

use config::AppConfig;
use engine::pg::PgSwipeStore;
use spark_shared::clients::db::{self, DbPool, PoolSettings};
use spark_shared::clients::rabbitmq::RabbitMQClient;
use spark_shared::middleware::{init_metrics, init_tracing, metrics_middleware};

pub struct AppState {
    pub db: DbPool,
    pub store: PgSwipeStore,
    pub rabbitmq: RabbitMQClient,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("spark-swipe");
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
    let store = PgSwipeStore::new(db.clone(), config.statement_timeout_ms);

    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;

    let state = Arc::new(AppState {
        db,
        store,
        rabbitmq,
        metrics_handle,
    });

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/swipes", post(routes::swipes::create_swipe))
        .route("/swipes/me", get(routes::swipes::my_swipes))
        .route("/swipes/:id", get(routes::swipes::get_swipe))
        .route("/matches", get(routes::matches::list_matches))
        .route("/matches/:id", axum::routing::patch(routes::matches::update_match))
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "spark-swipe starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
