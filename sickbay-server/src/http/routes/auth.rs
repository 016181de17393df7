//! Login and password confirmation
//!
//! No sessions are issued: a successful login returns the user profile and
//! the front-end keeps it. Argon2 work runs on the blocking pool.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, verify_unknown_account};
use crate::db::repos::{User, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::ValidJson;
use crate::http::server::AppState;
use crate::models::{Password, Username};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPasswordRequest {
    pub user_id: Uuid,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPasswordResponse {
    pub valid: bool,
}

/// Hash off the async executor.
pub(crate) async fn hash_blocking(password: Password) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal {
            message: format!("password hashing task failed: {e}"),
        })?
        .map_err(ApiError::from)
}

/// Verify off the async executor.
pub(crate) async fn verify_blocking(
    stored_hash: String,
    candidate: String,
) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&stored_hash, &candidate))
        .await
        .map_err(|e| ApiError::Internal {
            message: format!("password verification task failed: {e}"),
        })?
        .map_err(ApiError::from)
}

/// Spend the same Argon2 work as a real check, then fail.
async fn reject_blocking(candidate: String) -> ApiError {
    match tokio::task::spawn_blocking(move || verify_unknown_account(&candidate)).await {
        Ok(_) => ApiError::invalid_credentials(),
        Err(e) => ApiError::Internal {
            message: format!("password verification task failed: {e}"),
        },
    }
}

/// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<Json<User>, ApiError> {
    // A username that cannot exist is reported like a wrong password
    let Ok(username) = Username::new(&req.username) else {
        return Err(reject_blocking(req.password).await);
    };

    let Some((user, stored_hash)) = UserRepo::new(&state.pool)
        .credentials_by_username(&username)
        .await?
    else {
        tracing::info!(username = %username.as_str(), "Login failed: unknown user");
        return Err(reject_blocking(req.password).await);
    };

    if !verify_blocking(stored_hash, req.password).await? {
        tracing::info!(user_id = %user.id, "Login failed: wrong password");
        return Err(ApiError::invalid_credentials());
    }

    tracing::info!(user_id = %user.id, warehouse_id = %user.warehouse_id, "Login succeeded");
    Ok(Json(user))
}

/// POST /api/auth/verify-password
async fn verify(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<VerifyPasswordRequest>,
) -> Result<Json<VerifyPasswordResponse>, ApiError> {
    let stored_hash = UserRepo::new(&state.pool).password_hash(req.user_id).await?;
    let valid = verify_blocking(stored_hash, req.password).await?;
    Ok(Json(VerifyPasswordResponse { valid }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/verify-password", post(verify))
}
