//! Warehouse (clinic site) endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;

use crate::db::repos::{Warehouse, WarehouseFields, WarehouseRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ValidJson, ValidQuery, ValidUuid};
use crate::http::server::AppState;
use crate::models::{
    optional_text, required_text, Paginated, Pagination, PaginationParams, ValidationError,
    SHORT_TEXT_MAX,
};

#[derive(Debug, Deserialize)]
pub struct CreateWarehouseRequest {
    pub name: String,
    pub location: Option<String>,
    pub phone: Option<String>,
}

impl CreateWarehouseRequest {
    fn validate(self) -> Result<WarehouseFields, ValidationError> {
        Ok(WarehouseFields {
            name: required_text("name", &self.name, SHORT_TEXT_MAX)?,
            location: optional_text("location", self.location.as_deref(), SHORT_TEXT_MAX)?,
            phone: optional_text("phone", self.phone.as_deref(), 32)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateWarehouseRequest {
    pub name: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
}

impl UpdateWarehouseRequest {
    fn merge(self, current: Warehouse) -> Result<WarehouseFields, ValidationError> {
        CreateWarehouseRequest {
            name: self.name.unwrap_or(current.name),
            location: self.location.or(current.location),
            phone: self.phone.or(current.phone),
        }
        .validate()
    }
}

/// POST /api/warehouses
async fn create_warehouse(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<CreateWarehouseRequest>,
) -> Result<(StatusCode, Json<Warehouse>), ApiError> {
    let fields = req.validate()?;
    let warehouse = WarehouseRepo::new(&state.pool).create(fields).await?;
    tracing::info!(warehouse_id = %warehouse.id, name = %warehouse.name, "Warehouse created");
    Ok((StatusCode::CREATED, Json(warehouse)))
}

/// GET /api/warehouses
async fn list_warehouses(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Paginated<Warehouse>>, ApiError> {
    let page = Pagination::from(params);
    Ok(Json(WarehouseRepo::new(&state.pool).list(page).await?))
}

/// GET /api/warehouses/{warehouse_id}
async fn get_warehouse(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Warehouse>, ApiError> {
    Ok(Json(WarehouseRepo::new(&state.pool).get(id).await?))
}

/// PATCH /api/warehouses/{warehouse_id}
async fn update_warehouse(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<UpdateWarehouseRequest>,
) -> Result<Json<Warehouse>, ApiError> {
    let repo = WarehouseRepo::new(&state.pool);
    let fields = req.merge(repo.get(id).await?)?;
    Ok(Json(repo.update(id, fields).await?))
}

/// DELETE /api/warehouses/{warehouse_id}
async fn delete_warehouse(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    WarehouseRepo::new(&state.pool).soft_delete(id).await?;
    tracing::info!(warehouse_id = %id, "Warehouse deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/warehouses",
            get(list_warehouses).post(create_warehouse),
        )
        .route(
            "/api/warehouses/{warehouse_id}",
            get(get_warehouse)
                .patch(update_warehouse)
                .delete(delete_warehouse),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn blank_optional_fields_become_null() {
        let fields = CreateWarehouseRequest {
            name: " Main Clinic ".into(),
            location: Some("   ".into()),
            phone: None,
        }
        .validate()
        .unwrap();
        assert_eq!(fields.name, "Main Clinic");
        assert_eq!(fields.location, None);
    }

    #[test]
    fn patch_keeps_unmentioned_fields() {
        let now = Utc::now();
        let current = Warehouse {
            id: Uuid::nil(),
            name: "Main Clinic".into(),
            location: Some("Block A".into()),
            phone: Some("0800".into()),
            sync: false,
            synced_at: None,
            created_at: now,
            updated_at: now,
        };
        let fields = UpdateWarehouseRequest {
            phone: Some("".into()),
            ..Default::default()
        }
        .merge(current)
        .unwrap();

        assert_eq!(fields.name, "Main Clinic");
        assert_eq!(fields.location.as_deref(), Some("Block A"));
        assert_eq!(fields.phone, None);
    }
}
