//! Stock ledger reasons and the anti-theft dispensing rule

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Why a stock tracking row was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockReason {
    /// Goods received
    Restock,
    /// Dispensed over the counter (drug tracking)
    Dispense,
    /// Manual correction (count, damage, expiry)
    Adjustment,
    /// Dispensed as part of a consultation
    Consultation,
    /// Stock returned by voiding a consultation
    Void,
}

impl StockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restock => "restock",
            Self::Dispense => "dispense",
            Self::Adjustment => "adjustment",
            Self::Consultation => "consultation",
            Self::Void => "void",
        }
    }

    /// Parse a reason supplied to the manual stock endpoint.
    ///
    /// Only `restock` and `adjustment` are accepted there; the other reasons
    /// are written by dispensing and voiding.
    pub fn parse_manual(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_lowercase().as_str() {
            "restock" => Ok(Self::Restock),
            "adjustment" => Ok(Self::Adjustment),
            _ => Err(ValidationError::InvalidVariant {
                field: "reason",
                value: s.to_owned(),
            }),
        }
    }

    /// Reasons that count toward the anti-theft total.
    pub fn dispensing() -> [&'static str; 2] {
        [Self::Dispense.as_str(), Self::Consultation.as_str()]
    }
}

/// Longest accepted lookback window (one leap year).
pub const MAX_WINDOW_HOURS: u32 = 8784;

/// Threshold rule for flagging heavy dispensing of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiTheftPolicy {
    /// Units dispensed within the window above which activity is flagged
    pub threshold: i64,
    /// Lookback window in hours
    pub window_hours: u32,
}

impl AntiTheftPolicy {
    /// Flag only when the total strictly exceeds the threshold.
    pub fn is_suspicious(&self, dispensed_in_window: i64) -> bool {
        dispensed_in_window > self.threshold
    }

    /// Reject policies that would disable or break detection.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.threshold < 0 {
            return Err(ValidationError::OutOfRange {
                field: "threshold",
                reason: "cannot be negative",
            });
        }
        if self.window_hours == 0 {
            return Err(ValidationError::OutOfRange {
                field: "window_hours",
                reason: "must be at least one hour",
            });
        }
        if self.window_hours > MAX_WINDOW_HOURS {
            return Err(ValidationError::OutOfRange {
                field: "window_hours",
                reason: "cannot exceed 8784 hours",
            });
        }
        Ok(())
    }

    /// Lookback window, capped at [`MAX_WINDOW_HOURS`].
    pub fn window(&self) -> Duration {
        Duration::hours(i64::from(self.window_hours.min(MAX_WINDOW_HOURS)))
    }

    /// Start of the lookback window ending at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window()
    }
}

impl Default for AntiTheftPolicy {
    fn default() -> Self {
        Self {
            threshold: 50,
            window_hours: 24,
        }
    }
}
