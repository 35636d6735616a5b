//! Health check handler

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{db, state::AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub cache: &'static str,
}

/// Health routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Liveness of the store and the cache backing
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match db::check_ready(state.db()).await {
        Ok(true) => "up",
        Ok(false) => {
            tracing::warn!("Health check: operator catalog is empty; compiler is unusable");
            "catalog-empty"
        }
        Err(e) => {
            tracing::warn!("Health check: database unreachable: {}", e);
            "down"
        }
    };

    let mut conn = state.redis();
    let pong: Result<String, redis::RedisError> =
        redis::cmd("PING").query_async(&mut conn).await;
    let cache = match pong {
        Ok(_) => "up",
        Err(e) => {
            tracing::warn!("Health check: cache unreachable: {}", e);
            "down"
        }
    };

    let status = if database == "up" { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        database,
        cache,
    })
}
