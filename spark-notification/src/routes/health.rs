use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use spark_shared::types::api::{HealthCheck, HealthResponse};

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let broker: Result<(), &str> = if state.rabbitmq.is_connected() {
        Ok(())
    } else {
        Err("channel disconnected")
    };

    let checks = vec![HealthCheck::from_result("rabbitmq", broker)];
    Json(HealthResponse::healthy("spark-notification", env!("CARGO_PKG_VERSION")).with_checks(checks))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
