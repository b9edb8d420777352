//! Login, two-factor completion, refresh and logout
//!
//! [`SessionService`] composes the lockout policy, credential check,
//! two-factor engine, token service and revocation store into the flows
//! callers use. The login order is fixed:
//!
//! 1. lookup by email
//! 2. lock check, before any password comparison
//! 3. password check, counting failures
//! 4. active check
//! 5. second-factor check
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    Error, User, UserId, UserRecord,
    clock::Clock,
    error::{AuthError, TokenError},
    events::{Event, EventBus},
    repositories::{TwoFactorRepository, UserDirectory},
    revocation::RevocationService,
    token::{TokenClaims, TokenPair, TokenService, TokenType},
    two_factor::TwoFactorKind,
    validation::normalize_email,
};

use super::{CredentialVerifier, LockoutService, TwoFactorService};

/// A user who passed every check, with a fresh token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    pub user: User,
    pub tokens: TokenPair,
}

/// Pending second step of a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoFactorChallenge {
    pub user_id: UserId,
    /// Short-lived `temp_2fa` token to present with the code
    pub temp_token: String,
    pub expires_at: DateTime<Utc>,
    /// Kinds the user may answer with
    pub methods: Vec<TwoFactorKind>,
}

/// Every way a password login can end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated(AuthenticatedSession),
    Challenge2FA(TwoFactorChallenge),
    AccountLocked,
    /// `remaining_attempts` is only known for existing accounts
    InvalidCredentials { remaining_attempts: Option<u32> },
    AccountInactive,
}

impl LoginOutcome {
    /// Collapse non-successful outcomes into the error taxonomy.
    pub fn into_result(self) -> Result<AuthenticatedSession, Error> {
        match self {
            LoginOutcome::Authenticated(session) => Ok(session),
            LoginOutcome::Challenge2FA(_) => Err(AuthError::TwoFactorRequired.into()),
            LoginOutcome::AccountLocked => Err(AuthError::AccountLocked.into()),
            LoginOutcome::InvalidCredentials { .. } => Err(AuthError::InvalidCredentials.into()),
            LoginOutcome::AccountInactive => Err(AuthError::AccountInactive.into()),
        }
    }
}

pub struct SessionService<U: UserDirectory, R: TwoFactorRepository> {
    users: Arc<U>,
    credentials: Arc<CredentialVerifier<U>>,
    lockout: Arc<LockoutService<U>>,
    two_factor: Arc<TwoFactorService<R>>,
    tokens: Arc<TokenService>,
    revocation: Arc<RevocationService>,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl<U: UserDirectory, R: TwoFactorRepository> SessionService<U, R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<U>,
        credentials: Arc<CredentialVerifier<U>>,
        lockout: Arc<LockoutService<U>>,
        two_factor: Arc<TwoFactorService<R>>,
        tokens: Arc<TokenService>,
        revocation: Arc<RevocationService>,
        events: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            credentials,
            lockout,
            two_factor,
            tokens,
            revocation,
            events,
            clock,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, Error> {
        let email = normalize_email(email);

        let Some(record) = self.users.find_by_email(&email).await? else {
            self.credentials.burn_time(password).await?;
            tracing::debug!("Login attempt for unknown email");
            return Ok(LoginOutcome::InvalidCredentials {
                remaining_attempts: None,
            });
        };

        if self.lockout.is_record_locked(&record) {
            tracing::warn!(user_id = %record.id, "Login rejected for locked account");
            return Ok(LoginOutcome::AccountLocked);
        }

        if !self.credentials.check_password(&record, password).await? {
            let outcome = self.lockout.record_failure(&record.id).await?;
            if outcome.locked {
                return Ok(LoginOutcome::AccountLocked);
            }
            return Ok(LoginOutcome::InvalidCredentials {
                remaining_attempts: Some(outcome.remaining_attempts),
            });
        }

        self.lockout.record_success(&record.id).await?;

        if !record.is_active {
            tracing::info!(user_id = %record.id, "Login rejected for inactive account");
            return Ok(LoginOutcome::AccountInactive);
        }

        let methods: Vec<TwoFactorKind> = self
            .two_factor
            .active_methods(&record.id)
            .await?;
        if methods.iter().any(|kind| *kind != TwoFactorKind::Backup) {
            let issued = self.tokens.issue_temp_two_factor(&record.id)?;
            tracing::info!(user_id = %record.id, "Password accepted, awaiting second factor");
            return Ok(LoginOutcome::Challenge2FA(TwoFactorChallenge {
                user_id: record.id.clone(),
                temp_token: issued.token,
                expires_at: issued.claims.expires_at(),
                methods,
            }));
        }

        let session = self.start_session(record)?;
        Ok(LoginOutcome::Authenticated(session))
    }

    /// Second step of a challenged login.
    ///
    /// The temp token is single use: it is revoked once the code is accepted.
    pub async fn complete_two_factor(
        &self,
        temp_token: &str,
        kind: TwoFactorKind,
        code: &str,
    ) -> Result<AuthenticatedSession, Error> {
        let claims = self
            .verify_unrevoked(temp_token, TokenType::TempTwoFactor)
            .await?;
        let user_id = claims.user_id();

        // Only methods the challenge could have offered may answer it
        if !self.two_factor.active_methods(&user_id).await?.contains(&kind) {
            tracing::warn!(
                user_id = %user_id,
                kind = %kind,
                "Challenge answered with an inactive method"
            );
            return Err(AuthError::TwoFactorInvalid.into());
        }

        if !self.two_factor.verify(&user_id, kind, code).await? {
            return Err(AuthError::TwoFactorInvalid.into());
        }

        if !self.revoke_claims(temp_token, &claims).await? {
            // Lost a race with another completion of the same challenge
            return Err(TokenError::Revoked.into());
        }

        let record = self.load_usable(&user_id).await?;
        self.start_session(record)
    }

    /// Rotate a refresh token.
    ///
    /// The presented token is revoked before the new pair is issued; replaying
    /// it fails with [`TokenError::Revoked`].
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, Error> {
        let claims = self
            .verify_unrevoked(refresh_token, TokenType::Refresh)
            .await?;
        let record = self.load_usable(&claims.user_id()).await?;

        if !self.revoke_claims(refresh_token, &claims).await? {
            return Err(TokenError::Revoked.into());
        }

        self.tokens.issue_pair(&record.to_user())
    }

    /// Revoke the session's tokens. Best effort: failures are logged, never returned.
    pub async fn logout(&self, access_token: &str, refresh_token: Option<&str>) {
        for token in std::iter::once(access_token).chain(refresh_token) {
            let claims = match self.tokens.inspect(token) {
                Ok(claims) => claims,
                Err(_) => {
                    tracing::debug!("Ignoring unverifiable token on logout");
                    continue;
                }
            };
            if let Err(e) = self.revoke_claims(token, &claims).await {
                tracing::error!(
                    error = %e,
                    user_id = %claims.sub,
                    token_type = %claims.typ,
                    "Failed to revoke token on logout"
                );
            }
        }
    }

    /// Revoke any token issued by this service until its natural expiry.
    ///
    /// Idempotent; revoking an expired token is a no-op.
    pub async fn blacklist_token(&self, token: &str) -> Result<(), Error> {
        let claims = self.tokens.inspect(token)?;
        self.revoke_claims(token, &claims).await?;
        Ok(())
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool, Error> {
        self.revocation.is_revoked(token).await
    }

    pub async fn verify_access_token(&self, token: &str) -> Result<TokenClaims, Error> {
        self.verify_unrevoked(token, TokenType::Access).await
    }

    pub async fn verify_refresh_token(&self, token: &str) -> Result<TokenClaims, Error> {
        self.verify_unrevoked(token, TokenType::Refresh).await
    }

    /// Verify a single-use token and revoke it in the same step.
    ///
    /// Of concurrent redemptions of one token only the first succeeds.
    pub async fn redeem(&self, token: &str, expected: TokenType) -> Result<TokenClaims, Error> {
        let claims = self.verify_unrevoked(token, expected).await?;
        if !self.revoke_claims(token, &claims).await? {
            return Err(TokenError::Revoked.into());
        }
        Ok(claims)
    }

    /// Revocation check followed by signature, expiry and type verification.
    pub async fn verify_unrevoked(
        &self,
        token: &str,
        expected: TokenType,
    ) -> Result<TokenClaims, Error> {
        if self.revocation.is_revoked(token).await? {
            return Err(TokenError::Revoked.into());
        }
        Ok(self.tokens.verify(token, expected)?)
    }

    fn start_session(&self, record: UserRecord) -> Result<AuthenticatedSession, Error> {
        let user = record.to_user();
        let tokens = self.tokens.issue_pair(&user)?;
        tracing::info!(user_id = %user.id, "User authenticated");
        Ok(AuthenticatedSession { user, tokens })
    }

    /// Reload the subject of a token and make sure it may still hold a session.
    async fn load_usable(&self, user_id: &UserId) -> Result<UserRecord, Error> {
        let record = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(TokenError::Invalid)?;

        if !record.is_active {
            return Err(AuthError::AccountInactive.into());
        }
        if self.lockout.is_record_locked(&record) {
            return Err(AuthError::AccountLocked.into());
        }
        Ok(record)
    }

    /// Returns `true` if this call revoked the token.
    async fn revoke_claims(&self, token: &str, claims: &TokenClaims) -> Result<bool, Error> {
        let revoked = self.revocation.revoke(token, claims.expires_at()).await?;
        if revoked {
            self.events
                .publish(Event::TokenRevoked {
                    user_id: claims.user_id(),
                    token_type: claims.typ,
                    expires_at: claims.expires_at(),
                    timestamp: self.clock.now(),
                })
                .await;
        }
        Ok(revoked)
    }
}
