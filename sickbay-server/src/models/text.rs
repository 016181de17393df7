//! Free-text field validation shared by every entity
//!
//! Names, addresses and clinical notes are trimmed before storage. Optional
//! fields that are blank after trimming are stored as NULL.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

/// Default maximum for short descriptive fields (names, phone numbers).
pub const SHORT_TEXT_MAX: usize = 128;

/// Maximum for long free-text fields (allergies, diagnosis, notes).
pub const LONG_TEXT_MAX: usize = 4096;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid email regex")
});

/// Validate a required field: non-empty after trimming, at most `max` chars.
pub fn required_text(field: &'static str, s: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = s.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }

    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }

    Ok(trimmed.to_owned())
}

/// Validate an optional field. Blank input becomes `None`.
pub fn optional_text(
    field: &'static str,
    s: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match s.map(str::trim) {
        None | Some("") => Ok(None),
        Some(trimmed) => required_text(field, trimmed, max).map(Some),
    }
}

/// Validated, lowercased email address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email(String);

impl Email {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let value = required_text("email", s, 254)?.to_lowercase();

        if !EMAIL_RE.is_match(&value) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "must look like name@domain.tld",
            });
        }

        Ok(Self(value))
    }

    /// Parse an optional email, treating blank input as absent.
    pub fn parse_optional(s: Option<&str>) -> Result<Option<Self>, ValidationError> {
        match s.map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => Self::new(value).map(Some),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
