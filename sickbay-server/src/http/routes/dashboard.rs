//! Warehouse dashboard

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::db::repos::{Dashboard, DashboardRepo, WarehouseRepo};
use crate::http::error::ApiError;
use crate::http::extractors::ValidUuid;
use crate::http::server::AppState;

/// GET /api/warehouses/{warehouse_id}/dashboard
async fn dashboard(
    State(state): State<Arc<AppState>>,
    ValidUuid(warehouse_id): ValidUuid,
) -> Result<Json<Dashboard>, ApiError> {
    WarehouseRepo::new(&state.pool).ensure_exists(warehouse_id).await?;
    let summary = DashboardRepo::new(&state.pool).summary(warehouse_id).await?;
    Ok(Json(summary))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/warehouses/{warehouse_id}/dashboard", get(dashboard))
}
