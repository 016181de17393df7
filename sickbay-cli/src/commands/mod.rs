//! Command implementations for the sickbay CLI

pub mod migrate;
pub mod serve;
pub mod user;

pub use migrate::run_migrate;
pub use serve::run_serve;
pub use user::run_user;
