//! Money and quantity newtypes

use rust_decimal::Decimal;

use super::ValidationError;

/// Upper bound of NUMERIC(12,2), in cents.
const MAX_MONEY_CENTS: i64 = 999_999_999_999;

/// Largest stored stock level (INTEGER column).
pub const MAX_STOCK: i32 = i32::MAX;

/// Largest single quantity accepted in one line or stock movement.
const MAX_QUANTITY: i32 = 1_000_000;

/// Non-negative amount with at most two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Largest amount any money column can hold.
    pub fn max() -> Decimal {
        Decimal::new(MAX_MONEY_CENTS, 2)
    }

    pub fn new(field: &'static str, value: Decimal) -> Result<Self, ValidationError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(ValidationError::OutOfRange {
                field,
                reason: "cannot be negative",
            });
        }

        if value.scale() > 2 && value.normalize().scale() > 2 {
            return Err(ValidationError::InvalidFormat {
                field,
                reason: "at most two decimal places",
            });
        }

        if value > Self::max() {
            return Err(ValidationError::OutOfRange {
                field,
                reason: "exceeds the maximum amount",
            });
        }

        Ok(Self(value.round_dp(2)))
    }

    /// Amount that must be strictly positive (payments).
    pub fn positive(field: &'static str, value: Decimal) -> Result<Self, ValidationError> {
        let money = Self::new(field, value)?;
        if money.0.is_zero() {
            return Err(ValidationError::OutOfRange {
                field,
                reason: "must be greater than zero",
            });
        }
        Ok(money)
    }

    pub fn parse_optional(
        field: &'static str,
        value: Option<Decimal>,
    ) -> Result<Option<Self>, ValidationError> {
        value.map(|v| Self::new(field, v)).transpose()
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

/// Strictly positive item count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(i32);

impl Quantity {
    pub fn new(field: &'static str, value: i64) -> Result<Self, ValidationError> {
        if value <= 0 {
            return Err(ValidationError::OutOfRange {
                field,
                reason: "must be greater than zero",
            });
        }
        if value > MAX_QUANTITY as i64 {
            return Err(ValidationError::OutOfRange {
                field,
                reason: "exceeds the maximum quantity",
            });
        }
        Ok(Self(value as i32))
    }

    pub fn get(&self) -> i32 {
        self.0
    }
}

/// Signed, non-zero stock delta for restocks and adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange(i32);

impl StockChange {
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::OutOfRange {
                field: "quantity change",
                reason: "cannot be zero",
            });
        }
        if value.abs() > MAX_QUANTITY as i64 {
            return Err(ValidationError::OutOfRange {
                field: "quantity change",
                reason: "exceeds the maximum quantity",
            });
        }
        Ok(Self(value as i32))
    }

    pub fn get(&self) -> i32 {
        self.0
    }
}

/// Non-negative opening stock or reorder level.
pub fn non_negative_count(field: &'static str, value: i64) -> Result<i32, ValidationError> {
    if value < 0 {
        return Err(ValidationError::OutOfRange {
            field,
            reason: "cannot be negative",
        });
    }
    if value > MAX_QUANTITY as i64 {
        return Err(ValidationError::OutOfRange {
            field,
            reason: "exceeds the maximum quantity",
        });
    }
    Ok(value as i32)
}
