//! Database connection pools for the offline and online stores
//!
//! Both stores are PostgreSQL with the same schema. The offline store is
//! the one every request reads and writes; the online store is optional.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;

/// Default maximum connections per pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Create a PostgreSQL connection pool.
///
/// ```ignore
/// let pool = create_pool("postgres://localhost/sickbay").await?;
/// ```
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    create_pool_with_options(database_url, DEFAULT_MAX_CONNECTIONS).await
}

/// Create a PostgreSQL connection pool with an explicit connection limit.
pub async fn create_pool_with_options(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Offline (primary) and optional online pools.
#[derive(Debug, Clone)]
pub struct Stores {
    pub offline: PgPool,
    pub online: Option<PgPool>,
}

impl Stores {
    /// Connect to the configured stores. The offline store must be reachable;
    /// an unreachable online store is logged and left disabled.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let offline = create_pool_with_options(&config.offline_url, config.max_connections).await?;
        tracing::info!("Connected to offline store");

        let online = match &config.online_url {
            Some(url) => match create_pool_with_options(url, config.max_connections).await {
                Ok(pool) => {
                    tracing::info!("Connected to online store");
                    Some(pool)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Online store unreachable, continuing offline only");
                    None
                }
            },
            None => None,
        };

        Ok(Self { offline, online })
    }
}

/// Liveness of a single store
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreHealth {
    Ok,
    Unreachable,
    Disabled,
}

/// Run `SELECT 1` against a pool.
pub async fn ping(pool: &PgPool) -> StoreHealth {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await {
        Ok(_) => StoreHealth::Ok,
        Err(e) => {
            tracing::warn!(error = %e, "Store ping failed");
            StoreHealth::Unreachable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Integration tests require a real database
    // Run with: DATABASE_URL=postgres://... cargo test -p sickbay-server -- --ignored

    #[tokio::test]
    #[ignore = "requires database"]
    async fn pool_acquires_connection() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = create_pool(&url).await.expect("pool creation failed");
        assert_eq!(ping(&pool).await, StoreHealth::Ok);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn missing_online_url_is_disabled() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let config = DatabaseConfig {
            offline_url: url,
            online_url: None,
            max_connections: 2,
        };
        let stores = Stores::connect(&config).await.expect("connect failed");
        assert!(stores.online.is_none());
    }
}
