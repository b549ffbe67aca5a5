//! Small helpers for auth validation, OTP generation, and password hashing.

use anyhow::{Context, Result};
use rand::{rngs::OsRng, Rng, RngCore};
use regex::Regex;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Uniform 6-digit decimal one-time code.
pub(crate) fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Opaque session token tying an OTP to its pending record.
///
/// 20 random bytes rendered as hex: 160 bits of entropy, so collisions with a
/// live record need not be handled.
pub(crate) fn generate_temp_token() -> Result<String> {
    let mut bytes = [0u8; 20];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate verification session token")?;
    Ok(hex::encode(bytes))
}

/// Salted one-way hash for stored credentials.
pub(crate) fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).context("failed to hash password")
}

/// Constant outcome for bad hashes: an undecodable stored hash can never match.
pub(crate) fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Random throwaway credential for federation-only accounts. The plaintext is
/// discarded immediately, so password sign-in stays structurally impossible
/// until the user sets a real password.
pub(crate) fn generate_placeholder_password() -> Result<String> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate placeholder credential")?;
    Ok(hex::encode(bytes))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
