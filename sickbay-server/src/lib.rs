//! sickbay-server: clinic dispensary HTTP service
//!
//! Student records, consultations with billing, medicine stock with an
//! append-only ledger and dispensing alerts, and staff accounts, stored in
//! PostgreSQL with sync markers for an optional online copy.

pub mod auth;
pub mod config;
pub mod db;
pub mod http;
pub mod models;

pub use config::SickbayConfig;
pub use db::Stores;
pub use http::{build_router, run_server, AppState, ServerConfig};
