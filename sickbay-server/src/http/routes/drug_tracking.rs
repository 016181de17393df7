//! Drug tracking: over-the-counter dispensing, the stock ledger and
//! suspicious-activity flags

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repos::{StockEntry, StockRepo, SuspiciousActivity, WarehouseRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ValidJson, ValidQuery, ValidUuid};
use crate::http::server::AppState;
use crate::models::{
    optional_text, Paginated, Pagination, PaginationParams, Quantity, LONG_TEXT_MAX,
};

#[derive(Debug, Deserialize)]
pub struct DispenseRequest {
    pub product_id: Uuid,
    pub quantity: i64,
    pub user_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DispenseResponse {
    pub entry: StockEntry,
    /// Present when this dispense pushed the product over the threshold
    pub flagged: Option<SuspiciousActivity>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub product_id: Option<Uuid>,
}

/// POST /api/warehouses/{warehouse_id}/drug-tracking
async fn dispense(
    State(state): State<Arc<AppState>>,
    ValidUuid(warehouse_id): ValidUuid,
    ValidJson(req): ValidJson<DispenseRequest>,
) -> Result<(StatusCode, Json<DispenseResponse>), ApiError> {
    let quantity = Quantity::new("quantity", req.quantity)?;
    let notes = optional_text("notes", req.notes.as_deref(), LONG_TEXT_MAX)?;

    let (entry, flagged) = StockRepo::new(&state.pool)
        .dispense(
            warehouse_id,
            req.product_id,
            quantity,
            req.user_id,
            notes.as_deref(),
            &state.anti_theft,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(DispenseResponse { entry, flagged })))
}

/// GET /api/warehouses/{warehouse_id}/drug-tracking
async fn ledger(
    State(state): State<Arc<AppState>>,
    ValidUuid(warehouse_id): ValidUuid,
    ValidQuery(params): ValidQuery<LedgerParams>,
) -> Result<Json<Paginated<StockEntry>>, ApiError> {
    WarehouseRepo::new(&state.pool).ensure_exists(warehouse_id).await?;
    let page = Pagination::from(PaginationParams {
        page: params.page,
        per_page: params.per_page,
    });

    let entries = StockRepo::new(&state.pool)
        .list_ledger(warehouse_id, params.product_id, page)
        .await?;
    Ok(Json(entries))
}

/// GET /api/warehouses/{warehouse_id}/suspicious-activities
async fn suspicious_activities(
    State(state): State<Arc<AppState>>,
    ValidUuid(warehouse_id): ValidUuid,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Paginated<SuspiciousActivity>>, ApiError> {
    WarehouseRepo::new(&state.pool).ensure_exists(warehouse_id).await?;
    let flags = StockRepo::new(&state.pool)
        .list_suspicious(warehouse_id, Pagination::from(params))
        .await?;
    Ok(Json(flags))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/warehouses/{warehouse_id}/drug-tracking",
            get(ledger).post(dispense),
        )
        .route(
            "/api/warehouses/{warehouse_id}/suspicious-activities",
            get(suspicious_activities),
        )
}
