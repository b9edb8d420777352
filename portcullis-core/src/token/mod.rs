//! Signed, typed, expiring tokens
//!
//! Every token is a JWT whose payload is a [`TokenClaims`]:
//!
//! | Claim | Description                                                         |
//! | ----- | ------------------------------------------------------------------- |
//! | `sub` | The user the token was issued to.                                   |
//! | `typ` | The [`TokenType`]; verification requires an exact match.            |
//! | `iat` | Issued-at, seconds since the epoch.                                 |
//! | `exp` | Expiry, seconds since the epoch; checked against the injected clock. |
//! | `iss` | Issuer, pinned by [`JwtConfig`].                                    |
//! | `aud` | Audience, pinned by [`JwtConfig`].                                  |
//! | `jti` | Random token id, so two tokens are never byte-identical.            |
//!
//! Access tokens additionally carry a snapshot of the user's
//! [`AuthorizationClaims`](crate::AuthorizationClaims).

pub mod config;
pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuthorizationClaims, UserId};

pub use config::{JwtAlgorithm, JwtConfig, TokenLifetimes};
pub use service::TokenService;

/// Closed set of token purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
    #[serde(rename = "temp_2fa")]
    TempTwoFactor,
    PasswordReset,
    EmailVerification,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::TempTwoFactor => "temp_2fa",
            TokenType::PasswordReset => "password_reset",
            TokenType::EmailVerification => "email_verification",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub typ: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub jti: String,
    #[serde(flatten)]
    pub claims: AuthorizationClaims,
}

impl TokenClaims {
    pub fn user_id(&self) -> UserId {
        UserId::new(&self.sub)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// A token is alive strictly before its `exp` second.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// An encoded token together with the claims it was minted from.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

/// Access and refresh token issued together at login or rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires
    pub access_expires_in: i64,
    /// Seconds until the refresh token expires
    pub refresh_expires_in: i64,
}
