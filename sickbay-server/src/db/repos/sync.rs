//! Pending-propagation counts
//!
//! Reads the `sync`/`is_deleted` markers only. Nothing here moves rows
//! between stores.

use serde::Serialize;
use sqlx::PgPool;

use super::DbError;
use crate::db::migrations::{SOFT_DELETE_TABLES, SYNCED_TABLES};

/// Unsynced rows in one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePending {
    pub table: &'static str,
    /// Live rows with `sync = FALSE`
    pub pending: i64,
    /// Tombstoned rows with `sync = FALSE`
    pub pending_deletes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub tables: Vec<TablePending>,
    pub total_pending: i64,
}

impl SyncStatus {
    fn from_tables(tables: Vec<TablePending>) -> Self {
        let total_pending = tables.iter().map(|t| t.pending + t.pending_deletes).sum();
        Self {
            tables,
            total_pending,
        }
    }
}

pub struct SyncRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> SyncRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn status(&self) -> Result<SyncStatus, DbError> {
        let mut tables = Vec::with_capacity(SYNCED_TABLES.len());

        for table in SYNCED_TABLES {
            // Table names come from a fixed list, never from input
            let sql = if SOFT_DELETE_TABLES.contains(table) {
                format!(
                    "SELECT COUNT(*) FILTER (WHERE NOT is_deleted), COUNT(*) FILTER (WHERE is_deleted) \
                     FROM {table} WHERE NOT sync"
                )
            } else {
                format!("SELECT COUNT(*), 0::BIGINT FROM {table} WHERE NOT sync")
            };

            let (pending, pending_deletes): (i64, i64) =
                sqlx::query_as(&sql).fetch_one(self.pool).await?;

            tables.push(TablePending {
                table,
                pending,
                pending_deletes,
            });
        }

        Ok(SyncStatus::from_tables(tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_includes_tombstones() {
        let status = SyncStatus::from_tables(vec![
            TablePending {
                table: "students",
                pending: 2,
                pending_deletes: 1,
            },
            TablePending {
                table: "stock_tracking",
                pending: 4,
                pending_deletes: 0,
            },
        ]);
        assert_eq!(status.total_pending, 7);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn reports_every_synced_table() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool");
        crate::db::migrations::run(&pool).await.expect("migrations");

        let status = SyncRepo::new(&pool).status().await.expect("status");
        assert_eq!(status.tables.len(), SYNCED_TABLES.len());
    }
}
