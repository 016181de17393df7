//! Health check endpoint

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::db::{ping, StoreHealth};
use crate::http::server::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub offline: StoreHealth,
    pub online: StoreHealth,
}

impl HealthResponse {
    fn new(offline: StoreHealth, online: StoreHealth) -> Self {
        // Only the offline store is required to serve requests
        let status = if offline == StoreHealth::Ok { "ok" } else { "degraded" };
        Self {
            status,
            version: env!("CARGO_PKG_VERSION"),
            offline,
            online,
        }
    }
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let offline = ping(&state.pool).await;
    let online = match &state.online {
        Some(pool) => ping(pool).await,
        None => StoreHealth::Disabled,
    };

    Json(HealthResponse::new(offline, online))
}

/// Health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}
