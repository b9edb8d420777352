use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

/// Centralized validation utilities
///
/// Lazy-loaded email validation regex
///
/// This regex validates email addresses according to a practical subset of RFC 5322.
/// It's loaded once at runtime and reused for all email validation operations.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Invalid email regex pattern")
});

/// Canonical form of an email address used for every directory lookup.
///
/// ```rust
/// use portcullis_core::validation::normalize_email;
///
/// assert_eq!(normalize_email("  A@X.com "), "a@x.com");
/// ```
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates an email address
///
/// # Returns
///
/// Returns `Ok(())` if the email is valid, or a `ValidationError::InvalidEmail` if invalid.
///
/// # Examples
///
/// ```rust
/// use portcullis_core::validation::validate_email;
///
/// assert!(validate_email("user@example.com").is_ok());
/// assert!(validate_email("invalid-email").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::MissingField(
            "Email is required".to_string(),
        ));
    }

    if email.len() > 254 {
        return Err(ValidationError::InvalidEmail(
            "Email is too long".to_string(),
        ));
    }

    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(format!(
            "Invalid email format: {email}"
        )))
    }
}

/// Validates a new password according to security requirements
///
/// # Password Requirements
///
/// - Minimum 8 characters
/// - Maximum 72 bytes (bcrypt ignores anything beyond that)
/// - Cannot be empty or whitespace only
///
/// # Examples
///
/// ```rust
/// use portcullis_core::validation::validate_password;
///
/// assert!(validate_password("securepassword123").is_ok());
/// assert!(validate_password("weak").is_err());
/// ```
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField(
            "Password is required".to_string(),
        ));
    }

    if password.trim().is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password cannot be only whitespace".to_string(),
        ));
    }

    if password.chars().count() < 8 {
        return Err(ValidationError::InvalidPassword(
            "Password must be at least 8 characters long".to_string(),
        ));
    }

    if password.len() > 72 {
        return Err(ValidationError::InvalidPassword(
            "Password must be no more than 72 bytes long".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email_valid() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.co").is_ok());
    }

    #[test]
    fn test_validate_email_invalid() {
        assert!(matches!(
            validate_email(""),
            Err(ValidationError::MissingField(_))
        ));
        assert!(matches!(
            validate_email("no-at-sign"),
            Err(ValidationError::InvalidEmail(_))
        ));
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            validate_email(&long),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("A@X.COM"), "a@x.com");
        assert_eq!(normalize_email("\tuser@example.com\n"), "user@example.com");
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("Secret123").is_ok());
        assert!(matches!(
            validate_password(""),
            Err(ValidationError::MissingField(_))
        ));
        assert!(matches!(
            validate_password("        "),
            Err(ValidationError::InvalidPassword(_))
        ));
        assert!(matches!(
            validate_password("short"),
            Err(ValidationError::InvalidPassword(_))
        ));
        assert!(matches!(
            validate_password(&"x".repeat(73)),
            Err(ValidationError::InvalidPassword(_))
        ));
    }
}
