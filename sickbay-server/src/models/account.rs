//! Staff account fields: username, password, role

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ValidationError;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

/// Matches DB constraint: ^[a-z0-9][a-z0-9._-]{2,31}$
static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9._-]{2,31}$").expect("invalid username regex")
});

/// Validated username (lowercase slug, 3-32 chars)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Usernames are case-insensitive; input is lowercased before checking.
    ///
    /// ```
    /// use sickbay_server::models::Username;
    ///
    /// assert_eq!(Username::new("Nurse.Joy").unwrap().as_str(), "nurse.joy");
    /// assert!(Username::new("ab").is_err());
    /// assert!(Username::new("-admin").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let name = s.trim().to_lowercase();

        if name.is_empty() {
            return Err(ValidationError::Empty { field: "username" });
        }

        if name.len() > 32 {
            return Err(ValidationError::TooLong {
                field: "username",
                max: 32,
            });
        }

        if !USERNAME_RE.is_match(&name) {
            return Err(ValidationError::InvalidFormat {
                field: "username",
                reason: "must be 3-32 lowercase letters, digits, '.', '_' or '-', starting with a letter or digit",
            });
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Plaintext password accepted from a request, before hashing.
///
/// `Debug` output is redacted.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let count = s.chars().count();

        if count == 0 {
            return Err(ValidationError::Empty { field: "password" });
        }
        if count < MIN_PASSWORD_LEN {
            return Err(ValidationError::TooShort {
                field: "password",
                min: MIN_PASSWORD_LEN,
            });
        }
        if count > MAX_PASSWORD_LEN {
            return Err(ValidationError::TooLong {
                field: "password",
                max: MAX_PASSWORD_LEN,
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Staff role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Nurse,
    Pharmacist,
    Staff,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Doctor,
        Role::Nurse,
        Role::Pharmacist,
        Role::Staff,
    ];

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidVariant {
                field: "role",
                value: s.to_owned(),
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Doctor => "doctor",
            Self::Nurse => "nurse",
            Self::Pharmacist => "pharmacist",
            Self::Staff => "staff",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_usernames() {
        assert!(Username::new("admin").is_ok());
        assert!(Username::new("dr.okafor").is_ok());
        assert!(Username::new("nurse_2").is_ok());
    }

    #[test]
    fn rejects_bad_usernames() {
        assert!(matches!(
            Username::new("").unwrap_err(),
            ValidationError::Empty { .. }
        ));
        assert!(matches!(
            Username::new("has space").unwrap_err(),
            ValidationError::InvalidFormat { .. }
        ));
        assert!(matches!(
            Username::new(&"a".repeat(33)).unwrap_err(),
            ValidationError::TooLong { max: 32, .. }
        ));
    }

    #[test]
    fn password_bounds() {
        assert!(matches!(
            Password::new("short").unwrap_err(),
            ValidationError::TooShort { min: 8, .. }
        ));
        assert!(Password::new("long enough").is_ok());
        assert!(Password::new(&"x".repeat(129)).is_err());
    }

    #[test]
    fn password_debug_is_redacted() {
        let p = Password::new("hunter22hunter22").unwrap();
        assert_eq!(format!("{:?}", p), "Password(***)");
    }

    #[test]
    fn role_parse_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()).unwrap(), role);
        }
        assert_eq!(Role::parse(" Pharmacist ").unwrap(), Role::Pharmacist);
        assert!(Role::parse("janitor").is_err());
    }
}
