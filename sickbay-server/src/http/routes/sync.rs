//! Sync marker status

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::db::repos::{SyncRepo, SyncStatus};
use crate::http::error::ApiError;
use crate::http::server::AppState;

/// GET /api/sync/status - rows awaiting propagation, per table
async fn sync_status(State(state): State<Arc<AppState>>) -> Result<Json<SyncStatus>, ApiError> {
    let status = SyncRepo::new(&state.pool).status().await?;
    Ok(Json(status))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/sync/status", get(sync_status))
}
