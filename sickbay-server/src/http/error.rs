//! API error types with IntoResponse
//!
//! Errors are converted to JSON `{error, message}` responses with
//! appropriate status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::auth::PasswordError;
use crate::db::repos::DbError;
use crate::models::ValidationError;

/// Message shared by every failed credential check.
pub const INVALID_CREDENTIALS: &str = "invalid username or password";

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Body or query could not be parsed (400)
    BadRequest { message: String },

    /// Credentials rejected (401)
    Unauthorized { message: &'static str },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Unique constraint hit (409)
    Conflict { message: String },

    /// Dispensing more than is in stock (409)
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    /// Database error (500, logged)
    Database(DbError),

    /// Internal error (500)
    Internal { message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } | Self::InsufficientStock { .. } => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn invalid_credentials() -> Self {
        Self::Unauthorized {
            message: INVALID_CREDENTIALS,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(e) => json!({
                "error": "validation_error",
                "message": e.to_string()
            }),
            Self::BadRequest { message } => json!({
                "error": "validation_error",
                "message": message
            }),
            Self::Unauthorized { message } => json!({
                "error": "unauthorized",
                "message": message
            }),
            Self::NotFound { resource, id } => json!({
                "error": "not_found",
                "message": format!("{} '{}' not found", resource, id)
            }),
            Self::Conflict { message } => json!({
                "error": "conflict",
                "message": message
            }),
            Self::InsufficientStock {
                product_id,
                requested,
                available,
            } => json!({
                "error": "insufficient_stock",
                "message": format!(
                    "product '{}' has {} in stock, {} requested",
                    product_id, available, requested
                )
            }),
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!("Database error: {}", e);
                json!({
                    "error": "internal_error",
                    "message": "an internal error occurred"
                })
            }
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                json!({
                    "error": "internal_error",
                    "message": "an internal error occurred"
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::Conflict(message) => Self::Conflict { message },
            DbError::InsufficientStock {
                product_id,
                requested,
                available,
            } => Self::InsufficientStock {
                product_id,
                requested,
                available,
            },
            DbError::Validation(e) => Self::Validation(e),
            _ => Self::Database(e),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        Self::Internal {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_is_400() {
        let err = ApiError::Validation(ValidationError::Empty { field: "name" });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["message"], "name cannot be empty");
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let err = ApiError::from(DbError::not_found("student", "abc"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "student 'abc' not found");
    }

    #[tokio::test]
    async fn conflict_and_stock_are_409() {
        let conflict = ApiError::from(DbError::Conflict("taken".into()));
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let stock = ApiError::from(DbError::InsufficientStock {
            product_id: Uuid::nil(),
            requested: 5,
            available: 1,
        });
        let response = stock.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"], "insufficient_stock");
    }

    #[tokio::test]
    async fn unauthorized_is_401() {
        let response = ApiError::invalid_credentials().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn database_error_is_not_echoed() {
        let response = ApiError::from(DbError::Sqlx(sqlx::Error::PoolTimedOut)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "an internal error occurred");
    }

    #[test]
    fn repo_validation_maps_to_400() {
        let err = ApiError::from(DbError::Validation(ValidationError::OutOfRange {
            field: "payments",
            reason: "exceed the consultation total",
        }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
