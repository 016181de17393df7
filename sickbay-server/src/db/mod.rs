//! Database layer - connection pools, schema and repositories
//!
//! # Design Principles
//!
//! - Connection pool per store - no Arc<Mutex<Connection>>
//! - List operations JOIN display names in - no N+1 queries
//! - Rely on DB constraints, handle conflicts - no check-then-insert
//! - Transactions for multi-step operations

pub mod migrations;
pub mod pool;
pub mod repos;

pub use pool::{create_pool, create_pool_with_options, ping, StoreHealth, Stores};
pub use repos::*;
