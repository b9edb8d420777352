//! Password hashing and credential verification
//!
//! One scheme is used everywhere: bcrypt with a cost of at least
//! [`MIN_BCRYPT_COST`]. Hashing and verification run on the blocking pool.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::{
    Error, User, UserId, UserRecord,
    error::{AuthError, CryptoError, ValidationError},
    repositories::UserDirectory,
    validation::{normalize_email, validate_password},
};

pub const MIN_BCRYPT_COST: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordConfig {
    pub bcrypt_cost: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: MIN_BCRYPT_COST,
        }
    }
}

impl PasswordConfig {
    /// Costs below [`MIN_BCRYPT_COST`] are raised to it.
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost.max(MIN_BCRYPT_COST);
        self
    }

    pub fn from_env() -> Self {
        let cost = std::env::var("PORTCULLIS_BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(MIN_BCRYPT_COST);
        Self::default().with_bcrypt_cost(cost)
    }
}

/// bcrypt hashing and verification.
#[derive(Debug, Clone)]
pub struct PasswordService {
    config: PasswordConfig,
}

impl PasswordService {
    pub fn new(config: PasswordConfig) -> Self {
        Self {
            config: PasswordConfig::default().with_bcrypt_cost(config.bcrypt_cost),
        }
    }

    pub async fn hash_password(&self, password: &str) -> Result<String, Error> {
        let password = password.to_string();
        let cost = self.config.bcrypt_cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| CryptoError::PasswordHash(e.to_string()))?
            .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
        Ok(hash)
    }

    /// Constant-time comparison of `password` against a stored bcrypt hash.
    ///
    /// A malformed stored hash verifies as `false`.
    pub async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, Error> {
        let password = password.to_string();
        let hash = hash.to_string();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;

        match verified {
            Ok(ok) => Ok(ok),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash could not be parsed");
                Ok(false)
            }
        }
    }
}

/// Validates email and password against the [`UserDirectory`].
///
/// Attempt counting is not done here; see [`LockoutService`](super::LockoutService).
pub struct CredentialVerifier<U: UserDirectory> {
    users: Arc<U>,
    passwords: PasswordService,
    /// Hash compared against when the email is unknown, so that path costs the same
    dummy_hash: OnceCell<String>,
}

impl<U: UserDirectory> CredentialVerifier<U> {
    pub fn new(users: Arc<U>, passwords: PasswordService) -> Self {
        Self {
            users,
            passwords,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn passwords(&self) -> &PasswordService {
        &self.passwords
    }

    /// Look up an active user and check the password.
    ///
    /// Unknown, inactive and wrong-password cases are indistinguishable.
    pub async fn verify(&self, email: &str, password: &str) -> Result<User, Error> {
        let email = normalize_email(email);
        let Some(record) = self.users.find_active_by_email(&email).await? else {
            self.burn_time(password).await?;
            return Err(AuthError::InvalidCredentials.into());
        };

        if self.check_password(&record, password).await? {
            Ok(record.to_user())
        } else {
            Err(AuthError::InvalidCredentials.into())
        }
    }

    /// Check a password against an already loaded record, regardless of its status.
    pub async fn check_password(&self, record: &UserRecord, password: &str) -> Result<bool, Error> {
        self.passwords
            .verify_password(password, &record.password_hash)
            .await
    }

    /// Equalize timing for lookups that found no account.
    pub async fn burn_time(&self, password: &str) -> Result<(), Error> {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| self.passwords.hash_password("portcullis-timing-equalizer"))
            .await?;
        self.passwords.verify_password(password, dummy).await?;
        Ok(())
    }

    /// Replace a user's password after checking the current one.
    pub async fn change_password(
        &self,
        user_id: &UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        validate_password(new_password)?;

        let record = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self.check_password(&record, old_password).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        if old_password == new_password {
            return Err(ValidationError::InvalidPassword(
                "New password must differ from the current one".to_string(),
            )
            .into());
        }

        let new_hash = self.passwords.hash_password(new_password).await?;
        self.users.set_password_hash(user_id, &new_hash).await?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }
}
