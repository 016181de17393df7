//! Staff account endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::auth::{hash_blocking, verify_blocking};
use crate::db::repos::{User, UserProfile, UserRepo, WarehouseRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ValidJson, ValidQuery, ValidUuid};
use crate::http::server::AppState;
use crate::models::{
    required_text, Email, Paginated, Pagination, PaginationParams, Password, Role, Username,
    ValidationError, SHORT_TEXT_MAX,
};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: String,
}

impl CreateUserRequest {
    fn validate(self) -> Result<(Username, Password, UserProfile), ValidationError> {
        let username = Username::new(&self.username)?;
        let password = Password::new(&self.password)?;
        let profile = UserProfile {
            full_name: required_text("full name", &self.full_name, SHORT_TEXT_MAX)?,
            email: Email::parse_optional(self.email.as_deref())?.map(Email::into_string),
            role: Role::parse(&self.role)?,
        };
        Ok((username, password, profile))
    }
}

/// Absent fields are kept; a blank email clears it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl UpdateUserRequest {
    fn merge(self, current: &User) -> Result<UserProfile, ValidationError> {
        let full_name = match self.full_name {
            Some(name) => required_text("full name", &name, SHORT_TEXT_MAX)?,
            None => current.full_name.clone(),
        };
        let email = match self.email {
            Some(email) => Email::parse_optional(Some(&email))?.map(Email::into_string),
            None => current.email.clone(),
        };
        let role = Role::parse(self.role.as_deref().unwrap_or(&current.role))?;

        Ok(UserProfile {
            full_name,
            email,
            role,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /api/warehouses/{warehouse_id}/users
async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidUuid(warehouse_id): ValidUuid,
    ValidJson(req): ValidJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let (username, password, profile) = req.validate()?;
    let hash = hash_blocking(password).await?;

    let user = UserRepo::new(&state.pool)
        .create(warehouse_id, &username, profile, &hash)
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/warehouses/{warehouse_id}/users
async fn list_users(
    State(state): State<Arc<AppState>>,
    ValidUuid(warehouse_id): ValidUuid,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Paginated<User>>, ApiError> {
    WarehouseRepo::new(&state.pool).ensure_exists(warehouse_id).await?;
    let page = Pagination::from(params);
    let users = UserRepo::new(&state.pool)
        .list_for_warehouse(warehouse_id, page)
        .await?;
    Ok(Json(users))
}

/// GET /api/users/{id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<User>, ApiError> {
    Ok(Json(UserRepo::new(&state.pool).get(id).await?))
}

/// PATCH /api/users/{id}
async fn update_user(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let repo = UserRepo::new(&state.pool);
    let current = repo.get(id).await?;
    let profile = req.merge(&current)?;
    Ok(Json(repo.update_profile(id, profile).await?))
}

/// DELETE /api/users/{id}
async fn delete_user(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    UserRepo::new(&state.pool).soft_delete(id).await?;
    tracing::info!(user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/users/{id}/reset-password
async fn reset_password(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let password = Password::new(&req.new_password)?;
    let hash = hash_blocking(password).await?;

    UserRepo::new(&state.pool).set_password_hash(id, &hash).await?;
    tracing::info!(user_id = %id, "Password reset");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/users/{id}/change-password
async fn change_password(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let password = Password::new(&req.new_password)?;
    let repo = UserRepo::new(&state.pool);

    let stored_hash = repo.password_hash(id).await?;
    if !verify_blocking(stored_hash, req.current_password).await? {
        return Err(ApiError::Unauthorized {
            message: "current password is incorrect",
        });
    }

    let hash = hash_blocking(password).await?;
    repo.set_password_hash(id, &hash).await?;
    tracing::info!(user_id = %id, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/warehouses/{warehouse_id}/users",
            get(list_users).post(create_user),
        )
        .route(
            "/api/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/api/users/{id}/reset-password", post(reset_password))
        .route("/api/users/{id}/change-password", post(change_password))
}
