//! Password hashing for staff accounts (argon2, PHC string format)

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use once_cell::sync::Lazy;

use crate::models::Password;

/// Hash with the same parameters as real accounts, used when no account
/// matches so failed logins cost the same either way.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| {
    Password::new("no-such-account")
        .ok()
        .and_then(|password| hash_password(&password).ok())
});

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hash error: {0}")]
    Hash(String),

    #[error("stored password hash is malformed: {0}")]
    Malformed(String),
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &Password) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.expose().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Check a candidate password against a stored hash.
///
/// Returns `Ok(false)` on mismatch; `Err` only when the stored hash
/// cannot be parsed.
pub fn verify_password(stored_hash: &str, candidate: &str) -> Result<bool, PasswordError> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| PasswordError::Malformed(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok())
}

/// Run a full verification against the dummy hash. Always `false`.
pub fn verify_unknown_account(candidate: &str) -> bool {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(hash, candidate);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let password = Password::new("correct horse").unwrap();
        let hash = hash_password(&password).unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse").unwrap());
        assert!(!verify_password(&hash, "wrong horse").unwrap());
    }

    #[test]
    fn salts_differ() {
        let password = Password::new("same password").unwrap();
        let a = hash_password(&password).unwrap();
        let b = hash_password(&password).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_error() {
        let err = verify_password("plaintext", "anything").unwrap_err();
        assert!(matches!(err, PasswordError::Malformed(_)));
    }

    #[test]
    fn unknown_account_does_real_argon2_work() {
        let hash = DUMMY_HASH.as_deref().expect("dummy hash");
        assert!(hash.starts_with("$argon2"));
        assert!(!verify_unknown_account("no-such-account"));
        assert!(!verify_unknown_account("anything else"));
    }
}
