//! Warehouse repository
//!
//! A warehouse is one clinic/dispensary site and the tenancy boundary for
//! every other record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::DbError;
use crate::models::{Paginated, Pagination};

/// Warehouse record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Warehouse {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub sync: bool,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated warehouse fields for insert/update
#[derive(Debug, Clone)]
pub struct WarehouseFields {
    pub name: String,
    pub location: Option<String>,
    pub phone: Option<String>,
}

/// Warehouse repository
pub struct WarehouseRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> WarehouseRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, fields: WarehouseFields) -> Result<Warehouse, DbError> {
        sqlx::query_as(
            r#"
            INSERT INTO warehouses (name, location, phone)
            VALUES ($1, $2, $3)
            RETURNING id, name, location, phone, sync, synced_at, created_at, updated_at
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.location)
        .bind(&fields.phone)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            DbError::from_write(
                e,
                &format!("warehouse '{}' already exists", fields.name),
                "warehouse",
            )
        })
    }

    /// List live warehouses, newest first.
    pub async fn list(&self, page: Pagination) -> Result<Paginated<Warehouse>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, location, phone, sync, synced_at, created_at, updated_at,
                   COUNT(*) OVER() AS total
            FROM warehouses
            WHERE NOT is_deleted
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = rows.first().map(|r| r.get::<i64, _>("total")).unwrap_or(0);
        let items = rows
            .iter()
            .map(Warehouse::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page.wrap(items, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<Warehouse, DbError> {
        sqlx::query_as(
            r#"
            SELECT id, name, location, phone, sync, synced_at, created_at, updated_at
            FROM warehouses
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("warehouse", id))
    }

    /// Live warehouse whose name matches case-insensitively, as enforced by
    /// the `warehouses_name_live` index.
    pub async fn find_live_by_name(&self, name: &str) -> Result<Option<Warehouse>, DbError> {
        let warehouse = sqlx::query_as(
            r#"
            SELECT id, name, location, phone, sync, synced_at, created_at, updated_at
            FROM warehouses
            WHERE lower(name) = lower($1) AND NOT is_deleted
            "#,
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;
        Ok(warehouse)
    }

    /// Ensure a live warehouse exists.
    pub async fn ensure_exists(&self, id: Uuid) -> Result<(), DbError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1 AND NOT is_deleted)",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        if exists {
            Ok(())
        } else {
            Err(DbError::not_found("warehouse", id))
        }
    }

    pub async fn update(&self, id: Uuid, fields: WarehouseFields) -> Result<Warehouse, DbError> {
        sqlx::query_as(
            r#"
            UPDATE warehouses
            SET name = $2, location = $3, phone = $4,
                sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING id, name, location, phone, sync, synced_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.location)
        .bind(&fields.phone)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| {
            DbError::from_write(
                e,
                &format!("warehouse '{}' already exists", fields.name),
                "warehouse",
            )
        })?
        .ok_or_else(|| DbError::not_found("warehouse", id))
    }

    /// Soft delete: the row stays as a tombstone for propagation.
    pub async fn soft_delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE warehouses
            SET is_deleted = TRUE, sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("warehouse", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Integration tests - run with DATABASE_URL set
    // cargo test -p sickbay-server -- --ignored

    async fn pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool");
        crate::db::migrations::run(&pool).await.expect("migrations");
        pool
    }

    fn fields(name: &str) -> WarehouseFields {
        WarehouseFields {
            name: name.to_owned(),
            location: Some("Block C".to_owned()),
            phone: None,
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn soft_deleted_warehouse_is_hidden() {
        let pool = pool().await;
        let repo = WarehouseRepo::new(&pool);
        let name = format!("clinic-{}", Uuid::new_v4());

        let created = repo.create(fields(&name)).await.expect("create");
        assert!(!created.sync);

        repo.soft_delete(created.id).await.expect("delete");
        assert!(matches!(
            repo.get(created.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            repo.soft_delete(created.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn duplicate_live_name_conflicts() {
        let pool = pool().await;
        let repo = WarehouseRepo::new(&pool);
        let name = format!("clinic-{}", Uuid::new_v4());

        let first = repo.create(fields(&name)).await.expect("create");
        assert!(matches!(
            repo.create(fields(&name)).await,
            Err(DbError::Conflict(_))
        ));

        // Tombstoned names can be reused
        repo.soft_delete(first.id).await.expect("delete");
        repo.create(fields(&name)).await.expect("recreate");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn find_live_by_name_ignores_case_and_tombstones() {
        let pool = pool().await;
        let repo = WarehouseRepo::new(&pool);
        let name = format!("Clinic-{}", Uuid::new_v4());

        let created = repo.create(fields(&name)).await.expect("create");
        let found = repo
            .find_live_by_name(&name.to_uppercase())
            .await
            .expect("lookup")
            .expect("live warehouse");
        assert_eq!(found.id, created.id);

        repo.soft_delete(created.id).await.expect("delete");
        assert!(repo.find_live_by_name(&name).await.expect("lookup").is_none());
    }
}
