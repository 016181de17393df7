//! Repository error type

use uuid::Uuid;

use crate::models::ValidationError;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient stock for product '{product_id}': requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    /// Input that could only be checked against stored data
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Classify a failed write: unique violations become `Conflict`,
    /// foreign-key violations become `NotFound` for the referenced resource.
    pub fn from_write(err: sqlx::Error, conflict: &str, referenced: &'static str) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return Self::Conflict(conflict.to_owned());
            }
            if db.is_foreign_key_violation() {
                return Self::NotFound {
                    resource: referenced,
                    id: db.constraint().unwrap_or("reference").to_owned(),
                };
            }
        }
        Self::Sqlx(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_pass_through() {
        let err = DbError::from_write(sqlx::Error::RowNotFound, "dup", "warehouse");
        assert!(matches!(err, DbError::Sqlx(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn insufficient_stock_message() {
        let id = Uuid::nil();
        let err = DbError::InsufficientStock {
            product_id: id,
            requested: 5,
            available: 2,
        };
        assert!(err.to_string().contains("requested 5, available 2"));
    }
}
