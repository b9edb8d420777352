//! # Portcullis
//!
//! Portcullis is the authentication core of a multi-tenant backend: it decides
//! whether a caller is who they claim to be, keeps brute-force attempts out,
//! and manages the lifecycle of the JWTs that prove an authenticated session.
//!
//! It provides:
//! - Password login against a pluggable user directory, with bcrypt hashes
//! - Account lockout after repeated failed logins
//! - Access/refresh token pairs with refresh rotation and revocation
//! - TOTP, email one-time codes and single-use backup codes as second factors
//! - Audit events for every security-relevant transition
//!
//! User records and second-factor records live behind the
//! [`UserDirectory`] and [`TwoFactorRepository`] traits. In-memory
//! implementations ship with this crate; the `redis` feature adds a shared
//! revocation store for multi-instance deployments.
//!
//! ## Example
//!
//! ```rust,no_run
//! use portcullis::{LoginOutcome, PortcullisBuilder, PortcullisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), portcullis::Error> {
//!     let config = PortcullisConfig::from_env()?;
//!     let portcullis = PortcullisBuilder::new(config)
//!         .with_memory_storage()
//!         .build()
//!         .await?;
//!
//!     match portcullis.authenticate("a@x.com", "Secret123").await? {
//!         LoginOutcome::Authenticated(session) => println!("{}", session.tokens.access_token),
//!         LoginOutcome::Challenge2FA(challenge) => println!("needs {:?}", challenge.methods),
//!         other => println!("rejected: {other:?}"),
//!     }
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use chrono::{DateTime, Utc};
use portcullis_core::{
    error::AuthError,
    revocation::RevocationService,
    services::{CredentialVerifier, LockoutService, SessionService, TwoFactorService},
    token::TokenService,
    validation::validate_password,
};

mod builder;
mod config;

pub use builder::{NoStorage, PortcullisBuilder, WithStorage};
pub use config::PortcullisConfig;

/// Re-export core types from portcullis_core
///
/// These types are commonly used when working with the Portcullis API.
pub use portcullis_core::{
    AuthorizationClaims, Error, Event, EventHandler, LoginAttemptState, NotificationSender,
    RevocationStore, TokenClaims, TokenPair, TokenType, TwoFactorKind, TwoFactorRepository,
    UnlockReason, User, UserDirectory, UserId, UserRecord,
    clock::{Clock, ManualClock, SystemClock},
    error,
    revocation::{FallbackRevocationStore, MemoryRevocationStore},
    services::{
        AuthenticatedSession, LockoutConfig, LoginOutcome, PasswordConfig, TotpEnrollment,
        TwoFactorChallenge,
    },
    token::{IssuedToken, JwtAlgorithm, JwtConfig, TokenLifetimes},
    two_factor::TwoFactorConfig,
};

/// Re-export storage backends
pub use portcullis_storage_memory::{MemoryTwoFactorRepository, MemoryUserDirectory};

#[cfg(feature = "redis")]
pub use portcullis_redis::{RedisRevocationConfig, RedisRevocationStore};

/// The authentication coordinator.
///
/// `Portcullis` wires the credential check, lockout policy, token service,
/// revocation store and two-factor engine together and exposes the operations
/// a host application calls. Construct it with [`PortcullisBuilder`].
///
/// All methods take `&self`; share one instance behind an `Arc` across
/// request handlers.
pub struct Portcullis<U: UserDirectory, R: TwoFactorRepository> {
    users: Arc<U>,
    credentials: Arc<CredentialVerifier<U>>,
    lockout: Arc<LockoutService<U>>,
    two_factor: Arc<TwoFactorService<R>>,
    tokens: Arc<TokenService>,
    sessions: SessionService<U, R>,
    events: portcullis_core::EventBus,
    clock: Arc<dyn Clock>,
}

impl<U: UserDirectory, R: TwoFactorRepository> Portcullis<U, R> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        users: Arc<U>,
        credentials: Arc<CredentialVerifier<U>>,
        lockout: Arc<LockoutService<U>>,
        two_factor: Arc<TwoFactorService<R>>,
        tokens: Arc<TokenService>,
        revocation: Arc<RevocationService>,
        events: portcullis_core::EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions = SessionService::new(
            users.clone(),
            credentials.clone(),
            lockout.clone(),
            two_factor.clone(),
            tokens.clone(),
            revocation,
            events.clone(),
            clock.clone(),
        );

        Self {
            users,
            credentials,
            lockout,
            two_factor,
            tokens,
            sessions,
            events,
            clock,
        }
    }

    pub fn users(&self) -> &Arc<U> {
        &self.users
    }

    pub fn sessions(&self) -> &SessionService<U, R> {
        &self.sessions
    }

    pub fn two_factor(&self) -> &TwoFactorService<R> {
        &self.two_factor
    }

    pub fn lockout(&self) -> &LockoutService<U> {
        &self.lockout
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Register a handler for audit events
    pub async fn register_event_handler(&self, handler: Arc<dyn EventHandler>) {
        self.events.register(handler).await;
    }

    // ------------------------------------------------------------------
    // Login and sessions
    // ------------------------------------------------------------------

    /// Password login.
    ///
    /// Returns [`LoginOutcome::Challenge2FA`] when the user has an active
    /// second factor; finish with [`complete_two_factor`](Self::complete_two_factor).
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<LoginOutcome, Error> {
        self.sessions.login(email, password).await
    }

    pub async fn complete_two_factor(
        &self,
        temp_token: &str,
        kind: TwoFactorKind,
        code: &str,
    ) -> Result<AuthenticatedSession, Error> {
        self.sessions.complete_two_factor(temp_token, kind, code).await
    }

    /// Issue a pair for a user authenticated by other means
    pub fn issue_token_pair(&self, user: &User) -> Result<TokenPair, Error> {
        self.tokens.issue_pair(user)
    }

    pub async fn verify_access_token(&self, token: &str) -> Result<TokenClaims, Error> {
        self.sessions.verify_access_token(token).await
    }

    pub async fn verify_refresh_token(&self, token: &str) -> Result<TokenClaims, Error> {
        self.sessions.verify_refresh_token(token).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, Error> {
        self.sessions.refresh(refresh_token).await
    }

    pub async fn logout(&self, access_token: &str, refresh_token: Option<&str>) {
        self.sessions.logout(access_token, refresh_token).await
    }

    pub async fn blacklist_token(&self, token: &str) -> Result<(), Error> {
        self.sessions.blacklist_token(token).await
    }

    pub async fn is_token_revoked(&self, token: &str) -> Result<bool, Error> {
        self.sessions.is_revoked(token).await
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// bcrypt-hash a password for storage in the user directory.
    pub async fn hash_password(&self, password: &str) -> Result<String, Error> {
        validate_password(password)?;
        self.credentials.passwords().hash_password(password).await
    }

    pub async fn change_password(
        &self,
        user_id: &UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        self.credentials
            .change_password(user_id, old_password, new_password)
            .await
    }

    pub async fn is_account_locked(&self, user_id: &UserId) -> Result<bool, Error> {
        self.lockout.is_locked(user_id).await
    }

    /// Administrative unlock. Returns `false` if there was nothing to reset.
    pub async fn unlock_account(&self, user_id: &UserId) -> Result<bool, Error> {
        self.lockout.unlock(user_id).await
    }

    pub async fn issue_password_reset_token(&self, user_id: &UserId) -> Result<IssuedToken, Error> {
        self.require_user(user_id).await?;
        self.tokens.issue_password_reset(user_id)
    }

    /// Check a reset token without consuming it
    pub async fn verify_password_reset_token(&self, token: &str) -> Result<TokenClaims, Error> {
        self.sessions
            .verify_unrevoked(token, TokenType::PasswordReset)
            .await
    }

    /// Set a new password with a reset token. The token is consumed.
    ///
    /// A reset does not clear a lockout; that stays an administrative action.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<UserId, Error> {
        validate_password(new_password)?;
        let claims = self
            .sessions
            .verify_unrevoked(token, TokenType::PasswordReset)
            .await?;
        let user_id = claims.user_id();

        // The token stays usable if the account cannot take a new password
        self.require_user(&user_id).await?;
        self.sessions.redeem(token, TokenType::PasswordReset).await?;

        let hash = self.credentials.passwords().hash_password(new_password).await?;
        self.users.set_password_hash(&user_id, &hash).await?;

        tracing::info!(user_id = %user_id, "Password reset");
        Ok(user_id)
    }

    pub async fn issue_email_verification_token(
        &self,
        user_id: &UserId,
    ) -> Result<IssuedToken, Error> {
        self.require_user(user_id).await?;
        self.tokens.issue_email_verification(user_id)
    }

    /// Consume an email verification token and return its subject.
    ///
    /// Recording the verified address is up to the host's user directory.
    pub async fn verify_email_verification_token(&self, token: &str) -> Result<UserId, Error> {
        let claims = self
            .sessions
            .redeem(token, TokenType::EmailVerification)
            .await?;
        Ok(claims.user_id())
    }

    // ------------------------------------------------------------------
    // Second factors
    // ------------------------------------------------------------------

    pub async fn enroll_totp(&self, user_id: &UserId, email: &str) -> Result<TotpEnrollment, Error> {
        self.two_factor.enroll_totp(user_id, email).await
    }

    /// Activate TOTP with a first code; returns the one-time view of the backup codes.
    pub async fn activate_totp(&self, user_id: &UserId, code: &str) -> Result<Vec<String>, Error> {
        self.two_factor.activate_totp(user_id, code).await
    }

    pub async fn verify_totp(&self, user_id: &UserId, code: &str) -> Result<bool, Error> {
        self.two_factor.verify_totp(user_id, code).await
    }

    pub async fn enroll_email(
        &self,
        user_id: &UserId,
        destination: &str,
    ) -> Result<DateTime<Utc>, Error> {
        self.two_factor.enroll_email(user_id, destination).await
    }

    /// Send a fresh email code; returns when it expires.
    pub async fn send_email_code(&self, user_id: &UserId) -> Result<DateTime<Utc>, Error> {
        self.two_factor.send_email_code(user_id).await
    }

    pub async fn verify_email_code(&self, user_id: &UserId, code: &str) -> Result<bool, Error> {
        self.two_factor.verify_email_code(user_id, code).await
    }

    pub async fn verify_backup_code(&self, user_id: &UserId, code: &str) -> Result<bool, Error> {
        self.two_factor.verify_backup_code(user_id, code).await
    }

    pub async fn regenerate_backup_codes(&self, user_id: &UserId) -> Result<Vec<String>, Error> {
        self.two_factor.regenerate_backup_codes(user_id).await
    }

    pub async fn remaining_backup_codes(&self, user_id: &UserId) -> Result<usize, Error> {
        self.two_factor.remaining_backup_codes(user_id).await
    }

    pub async fn active_two_factor_methods(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<TwoFactorKind>, Error> {
        self.two_factor.active_methods(user_id).await
    }

    pub async fn disable_two_factor(
        &self,
        user_id: &UserId,
        kind: TwoFactorKind,
    ) -> Result<(), Error> {
        self.two_factor.disable(user_id, kind).await
    }

    async fn require_user(&self, user_id: &UserId) -> Result<UserRecord, Error> {
        let record = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !record.is_active {
            return Err(AuthError::AccountInactive.into());
        }
        Ok(record)
    }
}

impl<U: UserDirectory, R: TwoFactorRepository> std::fmt::Debug for Portcullis<U, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Portcullis")
            .field("lockout", self.lockout.config())
            .field("two_factor", self.two_factor.config())
            .field("tokens", self.tokens.lifetimes())
            .finish_non_exhaustive()
    }
}

/// Convenience alias for a fully in-memory deployment
pub type MemoryPortcullis = Portcullis<MemoryUserDirectory, MemoryTwoFactorRepository>;
