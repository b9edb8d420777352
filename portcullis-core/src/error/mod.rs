pub mod utilities;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Never reveals whether the email or the password was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked")]
    AccountLocked,

    #[error("Account inactive")]
    AccountInactive,

    #[error("User not found")]
    UserNotFound,

    #[error("Two-factor authentication required")]
    TwoFactorRequired,

    #[error("Invalid two-factor code")]
    TwoFactorInvalid,

    #[error("Two-factor authentication locked until {until}")]
    TwoFactorLocked { until: DateTime<Utc> },

    #[error("Two-factor method is not enabled")]
    TwoFactorNotEnabled,

    #[error("Two-factor method is already enabled")]
    TwoFactorAlreadyEnabled,
}

/// Token failures are deliberately coarse: signature, expiry, type, issuer and
/// audience mismatches all surface as [`TokenError::Invalid`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid token")]
    Invalid,

    #[error("Token has been revoked")]
    Revoked,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid user ID: {0}")]
    InvalidUserId(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event bus error: {0}")]
    BusError(String),

    #[error("Event handler error: {0}")]
    HandlerError(String),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Failed to deliver notification: {0}")]
    Delivery(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("JWT signing failed: {0}")]
    JwtSigning(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Random number generation failed: {0}")]
    Random(String),

    #[error("Invalid TOTP secret")]
    InvalidSecret,
}

impl Error {
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_token_error(&self) -> bool {
        matches!(self, Error::Token(_))
    }

    pub fn is_two_factor_error(&self) -> bool {
        matches!(
            self,
            Error::Auth(AuthError::TwoFactorRequired)
                | Error::Auth(AuthError::TwoFactorInvalid)
                | Error::Auth(AuthError::TwoFactorLocked { .. })
                | Error::Auth(AuthError::TwoFactorNotEnabled)
                | Error::Auth(AuthError::TwoFactorAlreadyEnabled)
        )
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_crypto_error(&self) -> bool {
        matches!(self, Error::Crypto(_))
    }
}
