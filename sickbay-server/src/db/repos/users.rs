//! Staff account repository
//!
//! Password hashes never leave this module except through
//! [`UserRepo::credentials_by_username`] and [`UserRepo::password_hash`],
//! which exist only for verification.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::DbError;
use crate::models::{Paginated, Pagination, Role, Username};

/// User record from database (without the password hash)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: String,
    pub sync: bool,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable profile fields
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub full_name: String,
    pub email: Option<String>,
    pub role: Role,
}

/// User repository
pub struct UserRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a user in a live warehouse.
    pub async fn create(
        &self,
        warehouse_id: Uuid,
        username: &Username,
        profile: UserProfile,
        password_hash: &str,
    ) -> Result<User, DbError> {
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

        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (warehouse_id, username, full_name, email, role, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, warehouse_id, username, full_name, email, role,
                      sync, synced_at, created_at, updated_at
            "#,
        )
        .bind(warehouse_id)
        .bind(username.as_str())
        .bind(&profile.full_name)
        .bind(&profile.email)
        .bind(profile.role.as_str())
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            DbError::from_write(
                e,
                &format!("username '{}' is taken", username.as_str()),
                "warehouse",
            )
        })?;

        tx.commit().await?;
        Ok(user)
    }

    pub async fn list_for_warehouse(
        &self,
        warehouse_id: Uuid,
        page: Pagination,
    ) -> Result<Paginated<User>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, warehouse_id, username, full_name, email, role,
                   sync, synced_at, created_at, updated_at,
                   COUNT(*) OVER() AS total
            FROM users
            WHERE warehouse_id = $1 AND NOT is_deleted
            ORDER BY username ASC
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
            .map(User::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page.wrap(items, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<User, DbError> {
        sqlx::query_as(
            r#"
            SELECT id, warehouse_id, username, full_name, email, role,
                   sync, synced_at, created_at, updated_at
            FROM users
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn update_profile(&self, id: Uuid, profile: UserProfile) -> Result<User, DbError> {
        sqlx::query_as(
            r#"
            UPDATE users
            SET full_name = $2, email = $3, role = $4,
                sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING id, warehouse_id, username, full_name, email, role,
                      sync, synced_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&profile.full_name)
        .bind(&profile.email)
        .bind(profile.role.as_str())
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_deleted = TRUE, sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("user", id));
        }
        Ok(())
    }

    /// Live user and stored hash for a login attempt.
    pub async fn credentials_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<(User, String)>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, warehouse_id, username, full_name, email, role,
                   sync, synced_at, created_at, updated_at, password_hash
            FROM users
            WHERE username = $1 AND NOT is_deleted
            "#,
        )
        .bind(username.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => {
                let user = User::from_row(&row)?;
                let hash: String = row.try_get("password_hash")?;
                Ok(Some((user, hash)))
            }
            None => Ok(None),
        }
    }

    /// Stored hash for a live user.
    pub async fn password_hash(&self, id: Uuid) -> Result<String, DbError> {
        sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1 AND NOT is_deleted")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, sync = FALSE, synced_at = NULL, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("user", id));
        }
        Ok(())
    }

    /// Number of live users with the admin role (used by CLI bootstrap).
    pub async fn count_admins(&self) -> Result<i64, DbError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE role = 'admin' AND NOT is_deleted",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::{WarehouseFields, WarehouseRepo};

    async fn pool_with_warehouse() -> (PgPool, Uuid) {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool");
        crate::db::migrations::run(&pool).await.expect("migrations");
        let warehouse = WarehouseRepo::new(&pool)
            .create(WarehouseFields {
                name: format!("clinic-{}", Uuid::new_v4()),
                location: None,
                phone: None,
            })
            .await
            .expect("warehouse");
        (pool, warehouse.id)
    }

    fn profile() -> UserProfile {
        UserProfile {
            full_name: "Joy Nurse".to_owned(),
            email: None,
            role: Role::Nurse,
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn deleted_user_has_no_credentials() {
        let (pool, warehouse_id) = pool_with_warehouse().await;
        let repo = UserRepo::new(&pool);
        let username = Username::new(&format!("u{}", &Uuid::new_v4().simple().to_string()[..12]))
            .expect("username");

        let user = repo
            .create(warehouse_id, &username, profile(), "$argon2id$stub")
            .await
            .expect("create");
        assert!(repo.credentials_by_username(&username).await.unwrap().is_some());

        repo.soft_delete(user.id).await.expect("delete");
        assert!(repo.credentials_by_username(&username).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn user_in_missing_warehouse_is_not_found() {
        let (pool, _) = pool_with_warehouse().await;
        let username = Username::new("ghost.user").expect("username");
        let err = UserRepo::new(&pool)
            .create(Uuid::new_v4(), &username, profile(), "$argon2id$stub")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { resource: "warehouse", .. }));
    }
}
