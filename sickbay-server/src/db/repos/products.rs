//! Product (medicine) repository

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::stock::{apply_movement, ensure_staff_member, Movement};
use super::students::escape_like;
use super::DbError;
use crate::models::{Money, Paginated, Pagination, StockReason};

const PRODUCT_COLUMNS: &str = "id, warehouse_id, name, barcode, description, quantity, \
    cost_price, retail_price, wholesale_price, reorder_level, expiry_date, \
    sync, synced_at, created_at, updated_at";

/// Product record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub name: String,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub quantity: i32,
    pub cost_price: Decimal,
    pub retail_price: Decimal,
    pub wholesale_price: Decimal,
    pub reorder_level: i32,
    pub expiry_date: Option<NaiveDate>,
    pub sync: bool,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Descriptive product fields (no stock, no prices)
#[derive(Debug, Clone)]
pub struct ProductFields {
    pub name: String,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub reorder_level: i32,
    pub expiry_date: Option<NaiveDate>,
}

impl From<&Product> for ProductFields {
    fn from(p: &Product) -> Self {
        Self {
            name: p.name.clone(),
            barcode: p.barcode.clone(),
            description: p.description.clone(),
            reorder_level: p.reorder_level,
            expiry_date: p.expiry_date,
        }
    }
}

/// Full price set for a new product
#[derive(Debug, Clone, Copy)]
pub struct PriceSet {
    pub cost_price: Money,
    pub retail_price: Money,
    pub wholesale_price: Money,
}

/// Partial price update; `None` keeps the stored price.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricePatch {
    pub cost_price: Option<Money>,
    pub retail_price: Option<Money>,
    pub wholesale_price: Option<Money>,
}

impl PricePatch {
    pub fn is_empty(&self) -> bool {
        self.cost_price.is_none() && self.retail_price.is_none() && self.wholesale_price.is_none()
    }
}

/// Product list filters
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub low_stock_only: bool,
}

/// Product repository
pub struct ProductRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a product. A positive opening quantity is booked as a
    /// `restock` ledger row in the same transaction.
    pub async fn create(
        &self,
        warehouse_id: Uuid,
        fields: ProductFields,
        prices: PriceSet,
        opening_quantity: i32,
        user_id: Option<Uuid>,
    ) -> Result<Product, DbError> {
        let mut tx = self.pool.begin().await?;

        let warehouse_live: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1 AND NOT is_deleted)",
        )
        .bind(warehouse_id)
        .fetch_one(&mut *tx)
        .await?;

        if !warehouse_live {
            return Err(DbError::not_found("warehouse", warehouse_id));
        }

        ensure_staff_member(&mut *tx, warehouse_id, user_id).await?;

        let sql = format!(
            r#"
            INSERT INTO products (
                warehouse_id, name, barcode, description, quantity,
                cost_price, retail_price, wholesale_price, reorder_level, expiry_date
            )
            VALUES ($1, $2, $3, $4, 0, $5, $6, $7, $8, $9)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        let mut product: Product = sqlx::query_as(&sql)
            .bind(warehouse_id)
            .bind(&fields.name)
            .bind(&fields.barcode)
            .bind(&fields.description)
            .bind(prices.cost_price.value())
            .bind(prices.retail_price.value())
            .bind(prices.wholesale_price.value())
            .bind(fields.reorder_level)
            .bind(fields.expiry_date)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                DbError::from_write(
                    e,
                    &format!(
                        "barcode '{}' is already in use",
                        fields.barcode.as_deref().unwrap_or_default()
                    ),
                    "warehouse",
                )
            })?;

        if opening_quantity > 0 {
            let entry = apply_movement(
                &mut *tx,
                &Movement {
                    warehouse_id,
                    product_id: product.id,
                    user_id,
                    consultation_id: None,
                    change: opening_quantity,
                    reason: StockReason::Restock,
                    notes: Some("opening stock"),
                },
            )
            .await?;
            product.quantity = entry.quantity_after;
        }

        tx.commit().await?;
        Ok(product)
    }

    pub async fn list_for_warehouse(
        &self,
        warehouse_id: Uuid,
        filter: &ProductFilter,
        page: Pagination,
    ) -> Result<Paginated<Product>, DbError> {
        let pattern = filter
            .search
            .as_deref()
            .map(|s| format!("%{}%", escape_like(s.trim())));

        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}, COUNT(*) OVER() AS total
            FROM products
            WHERE warehouse_id = $1
              AND NOT is_deleted
              AND ($2::text IS NULL OR name ILIKE $2 OR barcode ILIKE $2)
              AND (NOT $3 OR quantity <= reorder_level)
            ORDER BY name ASC
            LIMIT $4 OFFSET $5
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(warehouse_id)
            .bind(pattern)
            .bind(filter.low_stock_only)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        let total = rows.first().map(|r| r.get::<i64, _>("total")).unwrap_or(0);
        let items = rows
            .iter()
            .map(Product::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page.wrap(items, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<Product, DbError> {
        let sql =
            format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND NOT is_deleted");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("product", id))
    }

    /// Update descriptive fields. Stock and prices are untouched.
    pub async fn update_details(
        &self,
        id: Uuid,
        fields: ProductFields,
    ) -> Result<Product, DbError> {
        let sql = format!(
            r#"
            UPDATE products
            SET name = $2, barcode = $3, description = $4, reorder_level = $5, expiry_date = $6,
                sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        sqlx::query_as(&sql)
            .bind(id)
            .bind(&fields.name)
            .bind(&fields.barcode)
            .bind(&fields.description)
            .bind(fields.reorder_level)
            .bind(fields.expiry_date)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| {
                DbError::from_write(
                    e,
                    &format!(
                        "barcode '{}' is already in use",
                        fields.barcode.as_deref().unwrap_or_default()
                    ),
                    "warehouse",
                )
            })?
            .ok_or_else(|| DbError::not_found("product", id))
    }

    /// Change only the supplied prices.
    pub async fn update_prices(&self, id: Uuid, patch: PricePatch) -> Result<Product, DbError> {
        let sql = format!(
            r#"
            UPDATE products
            SET cost_price = COALESCE($2, cost_price),
                retail_price = COALESCE($3, retail_price),
                wholesale_price = COALESCE($4, wholesale_price),
                sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        sqlx::query_as(&sql)
            .bind(id)
            .bind(patch.cost_price.map(|m| m.value()))
            .bind(patch.retail_price.map(|m| m.value()))
            .bind(patch.wholesale_price.map(|m| m.value()))
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("product", id))
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_deleted = TRUE, sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("product", id));
        }
        Ok(())
    }
}
