//! Cryptographic utilities for secret handling
//!
//! Revocation entries, backup codes and email one-time codes are never stored in
//! plaintext. This module provides:
//!
//! 1. SHA256 digests used as storage keys for high-entropy or short-lived secrets
//! 2. Constant-time comparison via the `subtle` crate
//! 3. CSPRNG helpers for TOTP secrets, numeric codes and backup codes
//!
//! ## Why SHA256 instead of bcrypt?
//!
//! Revoked tokens carry hundreds of bits of entropy, and one-time codes are
//! protected by expiry and per-method failure lockout, so a fast digest is
//! sufficient. Passwords, which are low-entropy and long-lived, go through
//! [`crate::services::PasswordService`] instead.

use rand::{Rng, TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::CryptoError;

/// Alphabet for backup codes. Excludes look-alike characters (0/O, 1/I/L).
const BACKUP_CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Fill a buffer of `len` bytes from the operating system CSPRNG.
pub fn random_bytes(len: usize) -> Result<Vec<u8>, CryptoError> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::Random(e.to_string()))?;
    Ok(bytes)
}

/// Generate a zero-padded numeric code with the given number of digits.
pub fn generate_numeric_code(digits: u32) -> String {
    let mut rng = rand::rng();
    (0..digits)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Generate a backup code formatted as `XXXX-XXXX`.
pub fn generate_backup_code() -> String {
    let mut rng = rand::rng();
    let mut code = String::with_capacity(9);
    for i in 0..8 {
        if i == 4 {
            code.push('-');
        }
        let idx = rng.random_range(0..BACKUP_CODE_ALPHABET.len());
        code.push(char::from(BACKUP_CODE_ALPHABET[idx]));
    }
    code
}

/// Canonical form of a user-typed backup code: uppercase, no separators or whitespace.
pub fn normalize_backup_code(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Hash a secret for storage using SHA256.
///
/// # Returns
///
/// A hex-encoded SHA256 hash of the input
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a secret against a stored hash with constant-time comparison.
pub fn verify_token_hash(token: &str, stored_hash: &str) -> bool {
    let computed_hash = hash_token(token);
    constant_time_compare(computed_hash.as_bytes(), stored_hash.as_bytes())
}

/// Perform constant-time comparison of two byte slices.
///
/// Slices of different length compare unequal immediately; length is not secret.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
