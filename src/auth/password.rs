// Password hashing with Argon2id
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params, Version,
};
use crate::errors::{AppError, Result};
use once_cell::sync::Lazy;

// Verified against when the account does not exist, so unknown and known
// accounts cost the same to reject.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("warden-dummy-password-for-timing").ok());

fn argon2_instance() -> Result<Argon2<'static>> {
    // OWASP recommended parameters for Argon2id
    let params = Params::new(
        19456,  // m_cost (memory): 19 MiB
        2,      // t_cost (iterations)
        1,      // p_cost (parallelism)
        Some(32) // output length
    ).map_err(|e| AppError::Cryptographic(format!("Failed to create Argon2 params: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password using Argon2id (19 MiB, 2 iterations, 1 lane)
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(AppError::ValidationError("Password cannot be empty".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2_instance()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Cryptographic(format!("Failed to hash password: {}", e)))?
        .to_string();

    tracing::debug!("Password hashed successfully");

    Ok(password_hash)
}

/// Verify a password against a PHC hash string
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Cryptographic(format!("Failed to parse password hash: {}", e)))?;

    // Parameters are read from the PHC string
    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => {
            tracing::error!("Password verification error: {}", e);
            Err(AppError::Cryptographic(format!("Password verification error: {}", e)))
        }
    }
}

/// Spend the same work as a real verification and always fail
pub fn verify_against_dummy(password: &str) -> bool {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
    false
}
