//! Product (medicine inventory) endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repos::{
    PricePatch, PriceSet, Product, ProductFields, ProductFilter, ProductRepo, StockEntry,
    StockRepo, WarehouseRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::{ValidJson, ValidQuery, ValidUuid};
use crate::http::server::AppState;
use crate::models::{
    non_negative_count, optional_text, required_text, Money, Paginated, Pagination,
    PaginationParams, StockChange, StockReason, ValidationError, LONG_TEXT_MAX, SHORT_TEXT_MAX,
};

/// Matches the column default.
const DEFAULT_REORDER_LEVEL: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub barcode: Option<String>,
    pub description: Option<String>,
    /// Opening stock
    pub quantity: Option<i64>,
    pub cost_price: Option<Decimal>,
    pub retail_price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    pub reorder_level: Option<i64>,
    pub expiry_date: Option<NaiveDate>,
    pub user_id: Option<Uuid>,
}

impl CreateProductRequest {
    fn validate(self) -> Result<(ProductFields, PriceSet, i32), ValidationError> {
        let price = |field, value: Option<Decimal>| Money::new(field, value.unwrap_or_default());

        let fields = ProductFields {
            name: required_text("name", &self.name, SHORT_TEXT_MAX)?,
            barcode: optional_text("barcode", self.barcode.as_deref(), 64)?,
            description: optional_text("description", self.description.as_deref(), LONG_TEXT_MAX)?,
            reorder_level: non_negative_count(
                "reorder level",
                self.reorder_level.unwrap_or(DEFAULT_REORDER_LEVEL),
            )?,
            expiry_date: self.expiry_date,
        };
        let prices = PriceSet {
            cost_price: price("cost price", self.cost_price)?,
            retail_price: price("retail price", self.retail_price)?,
            wholesale_price: price("wholesale price", self.wholesale_price)?,
        };
        let opening = non_negative_count("quantity", self.quantity.unwrap_or(0))?;

        Ok((fields, prices, opening))
    }
}

/// Descriptive fields only; stock and prices have their own endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub reorder_level: Option<i64>,
    pub expiry_date: Option<NaiveDate>,
}

impl UpdateProductRequest {
    fn merge(self, current: &Product) -> Result<ProductFields, ValidationError> {
        let base = ProductFields::from(current);
        Ok(ProductFields {
            name: match self.name {
                Some(name) => required_text("name", &name, SHORT_TEXT_MAX)?,
                None => base.name,
            },
            barcode: match self.barcode {
                Some(barcode) => optional_text("barcode", Some(&barcode), 64)?,
                None => base.barcode,
            },
            description: match self.description {
                Some(text) => optional_text("description", Some(&text), LONG_TEXT_MAX)?,
                None => base.description,
            },
            reorder_level: match self.reorder_level {
                Some(level) => non_negative_count("reorder level", level)?,
                None => base.reorder_level,
            },
            expiry_date: self.expiry_date.or(base.expiry_date),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePriceRequest {
    pub cost_price: Option<Decimal>,
    pub retail_price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
}

impl UpdatePriceRequest {
    fn validate(self) -> Result<PricePatch, ValidationError> {
        let patch = PricePatch {
            cost_price: Money::parse_optional("cost price", self.cost_price)?,
            retail_price: Money::parse_optional("retail price", self.retail_price)?,
            wholesale_price: Money::parse_optional("wholesale price", self.wholesale_price)?,
        };
        if patch.is_empty() {
            return Err(ValidationError::Empty { field: "prices" });
        }
        Ok(patch)
    }
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub quantity_change: i64,
    pub reason: String,
    pub user_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl StockRequest {
    fn validate(&self) -> Result<(StockChange, StockReason, Option<String>), ValidationError> {
        Ok((
            StockChange::new(self.quantity_change)?,
            StockReason::parse_manual(&self.reason)?,
            optional_text("notes", self.notes.as_deref(), LONG_TEXT_MAX)?,
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    #[serde(default)]
    pub low_stock: bool,
}

/// POST /api/warehouses/{warehouse_id}/products
async fn create_product(
    State(state): State<Arc<AppState>>,
    ValidUuid(warehouse_id): ValidUuid,
    ValidJson(req): ValidJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let user_id = req.user_id;
    let (fields, prices, opening) = req.validate()?;

    let product = ProductRepo::new(&state.pool)
        .create(warehouse_id, fields, prices, opening, user_id)
        .await?;

    tracing::info!(
        product_id = %product.id,
        warehouse_id = %warehouse_id,
        quantity = product.quantity,
        "Product created"
    );
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/warehouses/{warehouse_id}/products
async fn list_products(
    State(state): State<Arc<AppState>>,
    ValidUuid(warehouse_id): ValidUuid,
    ValidQuery(params): ValidQuery<ProductListParams>,
) -> Result<Json<Paginated<Product>>, ApiError> {
    WarehouseRepo::new(&state.pool).ensure_exists(warehouse_id).await?;
    let page = Pagination::from(PaginationParams {
        page: params.page,
        per_page: params.per_page,
    });
    let filter = ProductFilter {
        search: params.search.filter(|s| !s.trim().is_empty()),
        low_stock_only: params.low_stock,
    };

    let products = ProductRepo::new(&state.pool)
        .list_for_warehouse(warehouse_id, &filter, page)
        .await?;
    Ok(Json(products))
}

/// GET /api/products/{id}
async fn get_product(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(ProductRepo::new(&state.pool).get(id).await?))
}

/// PATCH /api/products/{id}
async fn update_product(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    let repo = ProductRepo::new(&state.pool);
    let current = repo.get(id).await?;
    let fields = req.merge(&current)?;
    Ok(Json(repo.update_details(id, fields).await?))
}

/// PATCH /api/products/{id}/price
async fn update_price(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<UpdatePriceRequest>,
) -> Result<Json<Product>, ApiError> {
    let patch = req.validate()?;
    let product = ProductRepo::new(&state.pool).update_prices(id, patch).await?;
    tracing::info!(product_id = %id, retail_price = %product.retail_price, "Prices updated");
    Ok(Json(product))
}

/// POST /api/products/{id}/stock - restock or adjustment
async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<StockRequest>,
) -> Result<(StatusCode, Json<StockEntry>), ApiError> {
    let (change, reason, notes) = req.validate()?;
    let entry = StockRepo::new(&state.pool)
        .adjust(id, change, reason, req.user_id, notes.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// DELETE /api/products/{id}
async fn delete_product(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    ProductRepo::new(&state.pool).soft_delete(id).await?;
    tracing::info!(product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/warehouses/{warehouse_id}/products",
            get(list_products).post(create_product),
        )
        .route(
            "/api/products/{id}",
            get(get_product).patch(update_product).delete(delete_product),
        )
        .route("/api/products/{id}/price", patch(update_price))
        .route("/api/products/{id}/stock", post(adjust_stock))
}
