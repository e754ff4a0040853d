use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use spark_shared::clients::db;
use spark_shared::types::api::{HealthCheck, HealthResponse};

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let checks = vec![
        HealthCheck::from_result("postgres", db::ping(&state.db)),
        HealthCheck::optional("redis", state.index.ping().await),
    ];
    Json(HealthResponse::healthy("spark-user", env!("CARGO_PKG_VERSION")).with_checks(checks))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
