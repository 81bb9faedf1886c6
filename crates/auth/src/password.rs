//! Password hashing (bcrypt).

use thiserror::Error;

/// bcrypt work factor for stored passwords.
pub const PASSWORD_COST: u32 = 10;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(#[from] bcrypt::BcryptError);

/// Hash a plaintext password for storage.
///
/// CPU-bound; async callers should run it on a blocking thread.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(plain, PASSWORD_COST)?)
}

/// Check a plaintext password against a stored hash.
///
/// A malformed hash counts as a mismatch rather than an error so callers can
/// answer every login failure the same way.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}
