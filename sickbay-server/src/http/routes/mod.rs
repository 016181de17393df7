//! Route handlers organized by resource

pub mod health;
pub mod sync;
pub mod auth;
pub mod users;
pub mod warehouses;
pub mod students;
pub mod products;
pub mod consultations;
pub mod drug_tracking;
pub mod dashboard;
