//! Password hashing and verification.
//!
//! Argon2id with a random salt per hash, PHC string format. Hashing is
//! deliberately slow; callers dispatch it via `spawn_blocking` so it does
//! not stall the async runtime.

use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng,
};

/// Errors that can occur during password operations.
#[derive(Debug)]
pub enum PasswordError {
    /// Error producing a hash
    Hashing(argon2::password_hash::Error),
    /// The stored hash is not a valid PHC string
    MalformedHash(argon2::password_hash::Error),
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::Hashing(e) => write!(f, "Failed to hash password: {}", e),
            PasswordError::MalformedHash(e) => write!(f, "Stored password hash is invalid: {}", e),
        }
    }
}

impl std::error::Error for PasswordError {}

/// Hash a plaintext password. Output differs between calls (random salt),
/// but always verifies against the input.
pub fn hash(plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(PasswordError::Hashing)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored hash.
/// Returns `Ok(false)` for a wrong password; errors only when the stored
/// hash itself cannot be parsed.
pub fn verify(plaintext: &str, stored_hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored_hash).map_err(PasswordError::MalformedHash)?;
    Ok(Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}
