//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod validation;
pub mod pagination;
pub mod text;
pub mod account;
pub mod student;
pub mod money;
pub mod billing;
pub mod stock;

pub use validation::ValidationError;
pub use pagination::{Pagination, Paginated, PaginationParams};
pub use text::{optional_text, required_text, Email, LONG_TEXT_MAX, SHORT_TEXT_MAX};
pub use account::{Password, Role, Username};
pub use student::{parse_optional, BloodGroup, Gender, Genotype, MatricNumber};
pub use money::{non_negative_count, Money, Quantity, StockChange, MAX_STOCK};
pub use billing::{BillLine, BillTotals, PaymentKind};
pub use stock::{AntiTheftPolicy, StockReason, MAX_WINDOW_HOURS};
