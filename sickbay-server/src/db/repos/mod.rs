//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Reads filter out soft-deleted rows
//! - Writes reset the `sync`/`synced_at` markers
//! - Unique constraints decide conflicts (no check-then-insert)
//! - Multi-step writes run in one transaction

pub mod error;
pub mod warehouses;
pub mod users;
pub mod students;
pub mod products;
pub mod stock;
pub mod consultations;
pub mod dashboard;
pub mod sync;

pub use error::DbError;
pub use warehouses::{Warehouse, WarehouseFields, WarehouseRepo};
pub use users::{User, UserProfile, UserRepo};
pub use students::{Student, StudentFields, StudentRepo};
pub use products::{PricePatch, PriceSet, Product, ProductFields, ProductFilter, ProductRepo};
pub use stock::{StockEntry, StockRepo, SuspiciousActivity};
pub use consultations::{
    ClinicalNotes, Consultation, ConsultationDetail, ConsultationFilter, ConsultationItem,
    ConsultationRepo, CreatedConsultation, NewConsultation, NewItem, Payment,
};
pub use dashboard::{Dashboard, DashboardCounts, DashboardRepo, Revenue};
pub use sync::{SyncRepo, SyncStatus, TablePending};
