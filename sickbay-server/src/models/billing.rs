//! Consultation billing: payment methods and totals

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Money, Quantity, ValidationError};

/// How a consultation was paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Cash,
    Card,
    Transfer,
    Insurance,
}

impl PaymentKind {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "card" | "pos" => Ok(Self::Card),
            "transfer" | "bank_transfer" => Ok(Self::Transfer),
            "insurance" | "nhis" => Ok(Self::Insurance),
            _ => Err(ValidationError::InvalidVariant {
                field: "payment method",
                value: s.to_owned(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Transfer => "transfer",
            Self::Insurance => "insurance",
        }
    }
}

/// One dispensed line, priced.
#[derive(Debug, Clone, Copy)]
pub struct BillLine {
    pub quantity: Quantity,
    pub unit_price: Money,
}

impl BillLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price.value() * Decimal::from(self.quantity.get())
    }
}

/// Header totals derived from lines and payments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillTotals {
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub balance: Decimal,
}

impl BillTotals {
    /// Sum lines and payments. Paying more than the total is rejected;
    /// paying less leaves an outstanding balance. The total must fit the
    /// money columns.
    pub fn compute(lines: &[BillLine], payments: &[Money]) -> Result<Self, ValidationError> {
        let total_amount: Decimal = lines.iter().map(BillLine::line_total).sum();
        let amount_paid: Decimal = payments.iter().map(Money::value).sum();

        if total_amount > Money::max() {
            return Err(ValidationError::OutOfRange {
                field: "total amount",
                reason: "exceeds the maximum amount",
            });
        }

        if amount_paid > total_amount {
            return Err(ValidationError::OutOfRange {
                field: "payments",
                reason: "exceed the consultation total",
            });
        }

        Ok(Self {
            total_amount,
            amount_paid,
            balance: total_amount - amount_paid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64, cents: i64) -> BillLine {
        BillLine {
            quantity: Quantity::new("quantity", qty).unwrap(),
            unit_price: Money::new("unit price", Decimal::new(cents, 2)).unwrap(),
        }
    }

    fn pay(cents: i64) -> Money {
        Money::positive("amount", Decimal::new(cents, 2)).unwrap()
    }

    #[test]
    fn totals_with_partial_payment() {
        let totals =
            BillTotals::compute(&[line(2, 250), line(1, 1000)], &[pay(1000)]).unwrap();
        assert_eq!(totals.total_amount, Decimal::new(1500, 2));
        assert_eq!(totals.amount_paid, Decimal::new(1000, 2));
        assert_eq!(totals.balance, Decimal::new(500, 2));
    }

    #[test]
    fn split_payment_settles_bill() {
        let totals = BillTotals::compute(&[line(3, 500)], &[pay(1000), pay(500)]).unwrap();
        assert!(totals.balance.is_zero());
    }

    #[test]
    fn total_beyond_money_column_rejected() {
        let err = BillTotals::compute(&[line(1_000_000, 10_000_000)], &[]).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::OutOfRange { field: "total amount", .. }
        ));

        // Exactly the column maximum still fits
        let totals = BillTotals::compute(&[line(1, 999_999_999_999)], &[]).unwrap();
        assert_eq!(totals.total_amount, Money::max());
    }

    #[test]
    fn overpayment_rejected() {
        let err = BillTotals::compute(&[line(1, 100)], &[pay(200)]).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { field: "payments", .. }));
    }

    #[test]
    fn consultation_without_items_is_free() {
        let totals = BillTotals::compute(&[], &[]).unwrap();
        assert!(totals.total_amount.is_zero());
        assert!(totals.balance.is_zero());
    }

    #[test]
    fn payment_aliases() {
        assert_eq!(PaymentKind::parse("POS").unwrap(), PaymentKind::Card);
        assert_eq!(PaymentKind::parse("nhis").unwrap(), PaymentKind::Insurance);
        assert!(PaymentKind::parse("barter").is_err());
    }
}
