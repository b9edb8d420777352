use std::path::Path;

use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{Error, error::ValidationError};

use super::TokenType;

/// JWT algorithm type
#[derive(Debug, Clone)]
pub enum JwtAlgorithm {
    /// RS256 - RSA with SHA-256
    RS256 {
        /// Private key for signing JWTs (PEM format)
        private_key: Vec<u8>,
        /// Public key for verifying JWTs (PEM format)
        public_key: Vec<u8>,
    },
    /// HS256 - HMAC with SHA-256
    HS256 {
        /// Secret key for both signing and verifying
        secret_key: Vec<u8>,
    },
}

/// Signing keys plus the issuer and audience every token is bound to.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub algorithm: JwtAlgorithm,
    /// `iss` claim written at issuance and required at verification
    pub issuer: String,
    /// `aud` claim written at issuance and required at verification
    pub audience: String,
}

pub const DEFAULT_ISSUER: &str = "portcullis";
pub const DEFAULT_AUDIENCE: &str = "portcullis-api";

impl JwtConfig {
    /// Create a new JWT configuration with RS256 algorithm
    pub fn new_rs256(private_key: Vec<u8>, public_key: Vec<u8>) -> Self {
        Self {
            algorithm: JwtAlgorithm::RS256 {
                private_key,
                public_key,
            },
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
        }
    }

    /// Create a new JWT configuration with HS256 algorithm
    pub fn new_hs256(secret_key: Vec<u8>) -> Self {
        Self {
            algorithm: JwtAlgorithm::HS256 { secret_key },
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
        }
    }

    /// Create a new JWT configuration from RSA key files (PEM format)
    pub fn from_rs256_pem_files(
        private_key_path: impl AsRef<Path>,
        public_key_path: impl AsRef<Path>,
    ) -> Result<Self, Error> {
        use std::fs::read;

        let private_key = read(private_key_path).map_err(|e| {
            ValidationError::InvalidField(format!("Failed to read private key file: {e}"))
        })?;

        let public_key = read(public_key_path).map_err(|e| {
            ValidationError::InvalidField(format!("Failed to read public key file: {e}"))
        })?;

        Ok(Self::new_rs256(private_key, public_key))
    }

    /// Load the configuration from `PORTCULLIS_JWT_*` environment variables.
    ///
    /// `PORTCULLIS_JWT_SECRET` selects HS256. Otherwise both
    /// `PORTCULLIS_JWT_PRIVATE_KEY_PATH` and `PORTCULLIS_JWT_PUBLIC_KEY_PATH`
    /// must point at PEM files for RS256.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = if let Ok(secret) = std::env::var("PORTCULLIS_JWT_SECRET") {
            if secret.len() < 32 {
                return Err(ValidationError::InvalidField(
                    "PORTCULLIS_JWT_SECRET must be at least 32 bytes".to_string(),
                )
                .into());
            }
            Self::new_hs256(secret.into_bytes())
        } else {
            match (
                std::env::var("PORTCULLIS_JWT_PRIVATE_KEY_PATH"),
                std::env::var("PORTCULLIS_JWT_PUBLIC_KEY_PATH"),
            ) {
                (Ok(private_key_path), Ok(public_key_path)) => {
                    Self::from_rs256_pem_files(private_key_path, public_key_path)?
                }
                _ => {
                    return Err(ValidationError::MissingField(
                        "PORTCULLIS_JWT_SECRET or PORTCULLIS_JWT_PRIVATE_KEY_PATH/PORTCULLIS_JWT_PUBLIC_KEY_PATH".to_string(),
                    )
                    .into());
                }
            }
        };

        if let Ok(issuer) = std::env::var("PORTCULLIS_JWT_ISSUER") {
            config.issuer = issuer;
        }
        if let Ok(audience) = std::env::var("PORTCULLIS_JWT_AUDIENCE") {
            config.audience = audience;
        }
        Ok(config)
    }

    /// Create a JWT configuration with a random HS256 secret key (for testing)
    #[cfg(test)]
    pub fn new_random_hs256() -> Self {
        Self::new_hs256(crate::crypto::random_bytes(32).expect("os rng"))
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// Get the algorithm to use with jsonwebtoken
    pub fn jwt_algorithm(&self) -> Algorithm {
        match &self.algorithm {
            JwtAlgorithm::RS256 { .. } => Algorithm::RS256,
            JwtAlgorithm::HS256 { .. } => Algorithm::HS256,
        }
    }

    /// Get the encoding key for signing
    pub fn get_encoding_key(&self) -> Result<EncodingKey, Error> {
        match &self.algorithm {
            JwtAlgorithm::RS256 { private_key, .. } => EncodingKey::from_rsa_pem(private_key)
                .map_err(|e| {
                    ValidationError::InvalidField(format!("Invalid RSA private key: {e}")).into()
                }),
            JwtAlgorithm::HS256 { secret_key } => Ok(EncodingKey::from_secret(secret_key)),
        }
    }

    /// Get the decoding key for verification
    pub fn get_decoding_key(&self) -> Result<DecodingKey, Error> {
        match &self.algorithm {
            JwtAlgorithm::RS256 { public_key, .. } => DecodingKey::from_rsa_pem(public_key)
                .map_err(|e| {
                    ValidationError::InvalidField(format!("Invalid RSA public key: {e}")).into()
                }),
            JwtAlgorithm::HS256 { secret_key } => Ok(DecodingKey::from_secret(secret_key)),
        }
    }

    /// Validation pinned to this config's algorithm, issuer and audience.
    ///
    /// Expiry is checked against the injected clock by the token service, so
    /// the library's own wall-clock `exp` check is disabled here.
    pub fn get_validation(&self) -> Validation {
        let mut validation = Validation::new(self.jwt_algorithm());
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation
    }
}

/// Natural lifetime of each token type, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLifetimes {
    pub access_secs: i64,
    pub refresh_secs: i64,
    pub temp_two_factor_secs: i64,
    pub password_reset_secs: i64,
    pub email_verification_secs: i64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access_secs: 15 * 60,
            refresh_secs: 7 * 24 * 60 * 60,
            temp_two_factor_secs: 10 * 60,
            password_reset_secs: 60 * 60,
            email_verification_secs: 24 * 60 * 60,
        }
    }
}

impl TokenLifetimes {
    pub fn with_access(mut self, ttl: Duration) -> Self {
        self.access_secs = ttl.num_seconds();
        self
    }

    pub fn with_refresh(mut self, ttl: Duration) -> Self {
        self.refresh_secs = ttl.num_seconds();
        self
    }

    pub fn with_temp_two_factor(mut self, ttl: Duration) -> Self {
        self.temp_two_factor_secs = ttl.num_seconds();
        self
    }

    pub fn with_password_reset(mut self, ttl: Duration) -> Self {
        self.password_reset_secs = ttl.num_seconds();
        self
    }

    pub fn with_email_verification(mut self, ttl: Duration) -> Self {
        self.email_verification_secs = ttl.num_seconds();
        self
    }

    /// Overrides from `PORTCULLIS_TOKEN_*_SECS`; unset or malformed values keep the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, default: i64| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &i64| *v > 0)
                .unwrap_or(default)
        };

        Self {
            access_secs: secs("PORTCULLIS_TOKEN_ACCESS_SECS", defaults.access_secs),
            refresh_secs: secs("PORTCULLIS_TOKEN_REFRESH_SECS", defaults.refresh_secs),
            temp_two_factor_secs: secs(
                "PORTCULLIS_TOKEN_TEMP_2FA_SECS",
                defaults.temp_two_factor_secs,
            ),
            password_reset_secs: secs(
                "PORTCULLIS_TOKEN_PASSWORD_RESET_SECS",
                defaults.password_reset_secs,
            ),
            email_verification_secs: secs(
                "PORTCULLIS_TOKEN_EMAIL_VERIFICATION_SECS",
                defaults.email_verification_secs,
            ),
        }
    }

    pub fn lifetime(&self, token_type: TokenType) -> Duration {
        let secs = match token_type {
            TokenType::Access => self.access_secs,
            TokenType::Refresh => self.refresh_secs,
            TokenType::TempTwoFactor => self.temp_two_factor_secs,
            TokenType::PasswordReset => self.password_reset_secs,
            TokenType::EmailVerification => self.email_verification_secs,
        };
        Duration::seconds(secs)
    }
}
