use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod events;
mod routes;
mod services;

use config::AppConfig;
use services::delivery::RetryPolicy;
use spark_shared::clients::email::EmailClient;
use spark_shared::clients::rabbitmq::RabbitMQClient;
use spark_shared::middleware::{init_metrics, init_tracing, metrics_middleware};

pub struct AppState {
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub email: EmailClient,
    pub policy: RetryPolicy,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("spark-notification");
    let metrics_handle = init_metrics()?;

    let config = AppConfig::load()?;
    let port = config.port;

    if config.resend_api_key.is_empty() {
        tracing::warn!("SPARK_NOTIFICATION__RESEND_API_KEY is not set, deliveries will be rejected");
    }

    let email = EmailClient::new(
        &config.resend_api_url,
        &config.resend_api_key,
        &config.from_email,
        &config.from_name,
        Duration::from_millis(config.email_timeout_ms),
    )?;

    let policy = RetryPolicy {
        max_attempts: config.max_attempts.max(1),
        base_delay: Duration::from_millis(config.base_backoff_ms),
        max_delay: Duration::from_millis(config.max_backoff_ms),
    };

    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;

    let state = Arc::new(AppState {
        config,
        rabbitmq,
        email,
        policy,
        metrics_handle,
    });

    let job_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_notification_jobs(job_state).await {
            tracing::error!(error = %e, "notification job subscriber failed");
        }
    });

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "spark-notification starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
