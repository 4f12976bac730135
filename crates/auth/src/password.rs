use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier as _, SaltString, rand_core::OsRng},
};

use backoffice_core::{DomainError, DomainResult};

/// Checks a plaintext password against a stored hash.
pub trait PasswordVerifier: Send + Sync {
    fn verify(&self, password: &str, password_hash: &str) -> bool;
}

/// Argon2id with the crate's default parameters; salt embedded in the PHC string.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Passwords;

impl Argon2Passwords {
    pub fn hash(&self, password: &str) -> DomainResult<String> {
        if password.is_empty() {
            return Err(DomainError::validation("password must not be empty"));
        }
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| DomainError::internal(format!("failed to hash password: {e}")))
    }
}

impl PasswordVerifier for Argon2Passwords {
    fn verify(&self, password: &str, password_hash: &str) -> bool {
        // Unparseable hashes simply never match.
        let Ok(parsed) = PasswordHash::new(password_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}
