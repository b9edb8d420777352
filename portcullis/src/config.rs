//! Aggregated configuration for a [`Portcullis`](crate::Portcullis) instance
use portcullis_core::{
    Error,
    services::{LockoutConfig, PasswordConfig},
    token::{JwtConfig, TokenLifetimes},
    two_factor::TwoFactorConfig,
};

/// Every policy knob of the engine in one place.
///
/// Only the signing keys have no default; everything else starts from the
/// per-component defaults.
///
/// # Example
///
/// ```rust
/// use chrono::Duration;
/// use portcullis::{JwtConfig, PortcullisConfig};
///
/// let config = PortcullisConfig::new(JwtConfig::new_hs256(b"a-32-byte-or-longer-signing-secret".to_vec()))
///     .with_max_failed_logins(3)
///     .with_access_token_lifetime(Duration::minutes(5));
/// assert_eq!(config.lockout.max_failed_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct PortcullisConfig {
    pub jwt: JwtConfig,
    pub tokens: TokenLifetimes,
    pub lockout: LockoutConfig,
    pub two_factor: TwoFactorConfig,
    pub password: PasswordConfig,
}

impl PortcullisConfig {
    pub fn new(jwt: JwtConfig) -> Self {
        Self {
            jwt,
            tokens: TokenLifetimes::default(),
            lockout: LockoutConfig::default(),
            two_factor: TwoFactorConfig::default(),
            password: PasswordConfig::default(),
        }
    }

    /// Build every section from `PORTCULLIS_*` environment variables.
    ///
    /// Fails only when no usable JWT key material is configured.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self {
            jwt: JwtConfig::from_env()?,
            tokens: TokenLifetimes::from_env(),
            lockout: LockoutConfig::from_env(),
            two_factor: TwoFactorConfig::from_env(),
            password: PasswordConfig::from_env(),
        })
    }

    pub fn with_token_lifetimes(mut self, tokens: TokenLifetimes) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_access_token_lifetime(mut self, ttl: chrono::Duration) -> Self {
        self.tokens = self.tokens.with_access(ttl);
        self
    }

    pub fn with_refresh_token_lifetime(mut self, ttl: chrono::Duration) -> Self {
        self.tokens = self.tokens.with_refresh(ttl);
        self
    }

    pub fn with_lockout(mut self, lockout: LockoutConfig) -> Self {
        self.lockout = lockout;
        self
    }

    pub fn with_max_failed_logins(mut self, max_failed_attempts: u32) -> Self {
        self.lockout = self.lockout.with_max_failed_attempts(max_failed_attempts);
        self
    }

    pub fn with_two_factor(mut self, two_factor: TwoFactorConfig) -> Self {
        self.two_factor = two_factor;
        self
    }

    pub fn with_password(mut self, password: PasswordConfig) -> Self {
        self.password = password;
        self
    }
}
