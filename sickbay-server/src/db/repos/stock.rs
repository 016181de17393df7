//! Stock ledger repository and the anti-theft check
//!
//! Every change to `products.quantity` goes through [`apply_movement`], which
//! updates the product and appends one `stock_tracking` row in the caller's
//! transaction. The quantity update is guarded in SQL so stock can never
//! go negative.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool, Row};
use uuid::Uuid;

use super::DbError;
use crate::models::{
    AntiTheftPolicy, Paginated, Pagination, Quantity, StockChange, StockReason, ValidationError,
    MAX_STOCK,
};

/// Ledger row, joined with the product name for display
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StockEntry {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub user_id: Option<Uuid>,
    pub consultation_id: Option<Uuid>,
    pub quantity_change: i32,
    pub quantity_after: i32,
    pub reason: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Flag raised when dispensing exceeds the policy threshold
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SuspiciousActivity {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub user_id: Option<Uuid>,
    pub total_dispensed: i64,
    pub threshold: i64,
    pub window_hours: i32,
    pub detected_at: DateTime<Utc>,
}

/// One stock movement to apply
#[derive(Debug, Clone)]
pub struct Movement<'m> {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub user_id: Option<Uuid>,
    pub consultation_id: Option<Uuid>,
    pub change: i32,
    pub reason: StockReason,
    pub notes: Option<&'m str>,
}

/// Apply a movement: guarded quantity update plus ledger append.
///
/// Fails with `InsufficientStock` when the change would take the quantity
/// below zero, `Validation` when it would exceed [`MAX_STOCK`], and
/// `NotFound` when the product is missing, deleted, or in another warehouse.
pub(crate) async fn apply_movement(
    conn: &mut PgConnection,
    movement: &Movement<'_>,
) -> Result<StockEntry, DbError> {
    let updated: Option<(i32, String)> = sqlx::query_as(
        r#"
        UPDATE products
        SET quantity = (quantity::BIGINT + $3)::INTEGER,
            sync = FALSE, synced_at = NULL, updated_at = NOW()
        WHERE id = $1 AND warehouse_id = $2 AND NOT is_deleted
          AND quantity::BIGINT + $3 BETWEEN 0 AND $4
        RETURNING quantity, name
        "#,
    )
    .bind(movement.product_id)
    .bind(movement.warehouse_id)
    .bind(i64::from(movement.change))
    .bind(i64::from(MAX_STOCK))
    .fetch_optional(&mut *conn)
    .await?;

    let (quantity_after, product_name) = match updated {
        Some(row) => row,
        None => {
            let available: Option<i32> = sqlx::query_scalar(
                "SELECT quantity FROM products WHERE id = $1 AND warehouse_id = $2 AND NOT is_deleted",
            )
            .bind(movement.product_id)
            .bind(movement.warehouse_id)
            .fetch_optional(&mut *conn)
            .await?;

            return Err(match available {
                Some(_) if movement.change > 0 => {
                    DbError::Validation(ValidationError::OutOfRange {
                        field: "quantity",
                        reason: "would exceed the maximum stock level",
                    })
                }
                Some(available) => DbError::InsufficientStock {
                    product_id: movement.product_id,
                    requested: -movement.change,
                    available,
                },
                None => DbError::not_found("product", movement.product_id),
            });
        }
    };

    let (id, created_at): (Uuid, DateTime<Utc>) = sqlx::query_as(
        r#"
        INSERT INTO stock_tracking (
            warehouse_id, product_id, user_id, consultation_id,
            quantity_change, quantity_after, reason, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, created_at
        "#,
    )
    .bind(movement.warehouse_id)
    .bind(movement.product_id)
    .bind(movement.user_id)
    .bind(movement.consultation_id)
    .bind(movement.change)
    .bind(quantity_after)
    .bind(movement.reason.as_str())
    .bind(movement.notes)
    .fetch_one(&mut *conn)
    .await?;

    Ok(StockEntry {
        id,
        warehouse_id: movement.warehouse_id,
        product_id: movement.product_id,
        product_name,
        user_id: movement.user_id,
        consultation_id: movement.consultation_id,
        quantity_change: movement.change,
        quantity_after,
        reason: movement.reason.as_str().to_owned(),
        notes: movement.notes.map(str::to_owned),
        created_at,
    })
}

/// Sum recent dispensing of a product and record a flag when it exceeds
/// the policy threshold.
pub(crate) async fn flag_if_suspicious(
    conn: &mut PgConnection,
    policy: &AntiTheftPolicy,
    warehouse_id: Uuid,
    product_id: Uuid,
    user_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<Option<SuspiciousActivity>, DbError> {
    let reasons: Vec<String> = StockReason::dispensing().map(String::from).to_vec();

    let dispensed: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(-quantity_change), 0)::BIGINT
        FROM stock_tracking
        WHERE warehouse_id = $1
          AND product_id = $2
          AND reason = ANY($3)
          AND created_at > $4
        "#,
    )
    .bind(warehouse_id)
    .bind(product_id)
    .bind(&reasons)
    .bind(policy.window_start(now))
    .fetch_one(&mut *conn)
    .await?;

    if !policy.is_suspicious(dispensed) {
        return Ok(None);
    }

    let window_hours = i32::try_from(policy.window_hours).map_err(|_| {
        DbError::Validation(ValidationError::OutOfRange {
            field: "window_hours",
            reason: "does not fit the ledger column",
        })
    })?;

    let activity: SuspiciousActivity = sqlx::query_as(
        r#"
        WITH inserted AS (
            INSERT INTO suspicious_activities (
                warehouse_id, product_id, user_id, total_dispensed, threshold, window_hours
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, warehouse_id, product_id, user_id, total_dispensed,
                      threshold, window_hours, detected_at
        )
        SELECT i.*, p.name AS product_name
        FROM inserted i
        JOIN products p ON p.id = i.product_id
        "#,
    )
    .bind(warehouse_id)
    .bind(product_id)
    .bind(user_id)
    .bind(dispensed)
    .bind(policy.threshold)
    .bind(window_hours)
    .fetch_one(&mut *conn)
    .await?;

    tracing::warn!(
        warehouse_id = %warehouse_id,
        product_id = %product_id,
        user_id = ?user_id,
        dispensed,
        threshold = policy.threshold,
        "Suspicious dispensing flagged"
    );

    Ok(Some(activity))
}

/// Fail with `NotFound` unless `user_id` is a live user of the warehouse.
pub(crate) async fn ensure_staff_member(
    conn: &mut PgConnection,
    warehouse_id: Uuid,
    user_id: Option<Uuid>,
) -> Result<(), DbError> {
    let Some(user_id) = user_id else {
        return Ok(());
    };

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND warehouse_id = $2 AND NOT is_deleted)",
    )
    .bind(user_id)
    .bind(warehouse_id)
    .fetch_one(&mut *conn)
    .await?;

    if exists {
        Ok(())
    } else {
        Err(DbError::not_found("user", user_id))
    }
}

/// Stock ledger repository
pub struct StockRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> StockRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Restock or adjust a product outside of dispensing.
    pub async fn adjust(
        &self,
        product_id: Uuid,
        change: StockChange,
        reason: StockReason,
        user_id: Option<Uuid>,
        notes: Option<&str>,
    ) -> Result<StockEntry, DbError> {
        let mut tx = self.pool.begin().await?;

        let warehouse_id: Uuid = sqlx::query_scalar(
            "SELECT warehouse_id FROM products WHERE id = $1 AND NOT is_deleted",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("product", product_id))?;

        ensure_staff_member(&mut *tx, warehouse_id, user_id).await?;

        let entry = apply_movement(
            &mut *tx,
            &Movement {
                warehouse_id,
                product_id,
                user_id,
                consultation_id: None,
                change: change.get(),
                reason,
                notes,
            },
        )
        .await?;

        tx.commit().await?;
        tracing::info!(
            product_id = %product_id,
            change = change.get(),
            reason = reason.as_str(),
            quantity_after = entry.quantity_after,
            "Stock adjusted"
        );
        Ok(entry)
    }

    /// Dispense a product over the counter and run the anti-theft check.
    pub async fn dispense(
        &self,
        warehouse_id: Uuid,
        product_id: Uuid,
        quantity: Quantity,
        user_id: Option<Uuid>,
        notes: Option<&str>,
        policy: &AntiTheftPolicy,
    ) -> Result<(StockEntry, Option<SuspiciousActivity>), DbError> {
        let mut tx = self.pool.begin().await?;

        ensure_staff_member(&mut *tx, warehouse_id, user_id).await?;

        let entry = apply_movement(
            &mut *tx,
            &Movement {
                warehouse_id,
                product_id,
                user_id,
                consultation_id: None,
                change: -quantity.get(),
                reason: StockReason::Dispense,
                notes,
            },
        )
        .await?;

        let flagged =
            flag_if_suspicious(&mut *tx, policy, warehouse_id, product_id, user_id, Utc::now())
                .await?;

        tx.commit().await?;
        Ok((entry, flagged))
    }

    /// Ledger for a warehouse, newest first, optionally for one product.
    pub async fn list_ledger(
        &self,
        warehouse_id: Uuid,
        product_id: Option<Uuid>,
        page: Pagination,
    ) -> Result<Paginated<StockEntry>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.warehouse_id, s.product_id, p.name AS product_name, s.user_id,
                   s.consultation_id, s.quantity_change, s.quantity_after, s.reason, s.notes,
                   s.created_at, COUNT(*) OVER() AS total
            FROM stock_tracking s
            JOIN products p ON p.id = s.product_id
            WHERE s.warehouse_id = $1
              AND ($2::uuid IS NULL OR s.product_id = $2)
            ORDER BY s.created_at DESC, s.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(warehouse_id)
        .bind(product_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = rows.first().map(|r| r.get::<i64, _>("total")).unwrap_or(0);
        let items = rows
            .iter()
            .map(StockEntry::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page.wrap(items, total))
    }

    pub async fn list_suspicious(
        &self,
        warehouse_id: Uuid,
        page: Pagination,
    ) -> Result<Paginated<SuspiciousActivity>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.warehouse_id, a.product_id, p.name AS product_name, a.user_id,
                   a.total_dispensed, a.threshold, a.window_hours, a.detected_at,
                   COUNT(*) OVER() AS total
            FROM suspicious_activities a
            JOIN products p ON p.id = a.product_id
            WHERE a.warehouse_id = $1
            ORDER BY a.detected_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(warehouse_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = rows.first().map(|r| r.get::<i64, _>("total")).unwrap_or(0);
        let items = rows
            .iter()
            .map(SuspiciousActivity::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page.wrap(items, total))
    }
}
