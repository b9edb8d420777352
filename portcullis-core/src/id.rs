//! ID generation utilities with prefix support
//!
//! IDs look like `usr_Zm9vYmFyYmF6cXV4`: a short type prefix followed by at
//! least 96 bits of URL-safe randomness. User ids and token ids (`jti`) both
//! use this format.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::RngCore;

pub const USER_ID_PREFIX: &str = "usr";
pub const TOKEN_ID_PREFIX: &str = "tok";

/// Generate a prefixed ID with 96 bits of entropy
///
/// # Example
/// ```
/// use portcullis_core::id::generate_prefixed_id;
///
/// let user_id = generate_prefixed_id("usr");
/// assert!(user_id.starts_with("usr_"));
/// ```
pub fn generate_prefixed_id(prefix: &str) -> String {
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);

    format!("{prefix}_{}", BASE64_URL_SAFE_NO_PAD.encode(bytes))
}

/// Validate that a prefixed ID has the expected format
///
/// # Returns
/// `true` if the ID has the correct format, `false` otherwise
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(random_part) = id
        .strip_prefix(expected_prefix)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };

    match BASE64_URL_SAFE_NO_PAD.decode(random_part) {
        Ok(decoded) => decoded.len() >= 12,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_prefixed_id() {
        let id = generate_prefixed_id(TOKEN_ID_PREFIX);
        assert!(id.starts_with("tok_"));
        assert_ne!(id, generate_prefixed_id(TOKEN_ID_PREFIX));
    }

    #[test]
    fn test_validate_prefixed_id() {
        let id = generate_prefixed_id(USER_ID_PREFIX);
        assert!(validate_prefixed_id(&id, USER_ID_PREFIX));
        assert!(!validate_prefixed_id(&id, TOKEN_ID_PREFIX));

        assert!(!validate_prefixed_id("usr", "usr"));
        assert!(!validate_prefixed_id("usr_", "usr"));
        assert!(!validate_prefixed_id("usr_invalid!", "usr"));
    }

    #[test]
    fn test_id_is_url_safe() {
        let id = generate_prefixed_id(USER_ID_PREFIX);
        assert!(
            id.chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        );
    }
}
