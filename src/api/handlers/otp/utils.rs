//! Code generation and hashing for the reset flow.
//!
//! Codes are fixed-length numeric and uniformly random; only a salted argon2
//! hash is ever persisted. Password hashes for the reset step use the same
//! scheme. Argon2 verification does not short-circuit on the first differing
//! byte, so comparisons do not leak match prefixes through timing.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, Rng};
use secrecy::SecretString;

/// Number of digits in a reset code.
pub(super) const CODE_LENGTH: usize = 6;

/// Create a fresh code, uniform over the full 6-digit space with leading
/// zeros preserved. Collisions across subjects are acceptable; only the
/// latest challenge per subject is live.
pub(super) fn generate_code() -> SecretString {
    let value = OsRng.gen_range(0..1_000_000_u32);
    SecretString::from(format!("{value:0width$}", width = CODE_LENGTH))
}

/// Salted, irreversible hash in PHC string format.
///
/// # Errors
/// Returns an error if hashing fails.
pub(crate) fn hash_secret(value: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(value.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash secret: {err}"))?;
    Ok(hash.to_string())
}

/// Check a candidate against a stored PHC hash.
///
/// # Errors
/// Returns an error if the stored hash is malformed; a plain mismatch is
/// `Ok(false)`.
pub(super) fn secret_matches(candidate: &str, stored: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(stored).map_err(|err| anyhow!("invalid stored hash: {err}"))?;
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(anyhow!("secret verification failed: {err}")),
    }
}
