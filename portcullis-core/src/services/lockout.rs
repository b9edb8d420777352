//! Account lockout after repeated failed logins.
//!
//! Each account carries a consecutive-failure counter and a blocked flag in the
//! [`UserDirectory`]. Reaching [`LockoutConfig::max_failed_attempts`] sets the
//! flag; only a successful login or an administrator clears it. There is no
//! time-based expiry.
//!
//! # Example
//!
//! ```rust,ignore
//! let lockout = LockoutService::new(users, LockoutConfig::default(), events, clock);
//!
//! // Check before comparing the password
//! if lockout.is_locked(&user_id).await? {
//!     return Err(AuthError::AccountLocked.into());
//! }
//!
//! // After a failed password check
//! let outcome = lockout.record_failure(&user_id).await?;
//! ```
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    Error, UserId, UserRecord,
    clock::Clock,
    events::{Event, EventBus, UnlockReason},
    repositories::UserDirectory,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutConfig {
    pub enabled: bool,
    pub max_failed_attempts: u32,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failed_attempts: 5,
        }
    }
}

impl LockoutConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_max_failed_attempts(mut self, max_failed_attempts: u32) -> Self {
        self.max_failed_attempts = max_failed_attempts.max(1);
        self
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: std::env::var("PORTCULLIS_LOCKOUT_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.enabled),
            max_failed_attempts: std::env::var("PORTCULLIS_LOCKOUT_MAX_FAILED_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u32| *v > 0)
                .unwrap_or(defaults.max_failed_attempts),
        }
    }
}

/// Result of recording one failed login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub failed_attempts: u32,
    /// The account is locked after this failure
    pub locked: bool,
    /// Attempts left before the account locks; zero once locked
    pub remaining_attempts: u32,
}

pub struct LockoutService<U: UserDirectory> {
    users: Arc<U>,
    config: LockoutConfig,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl<U: UserDirectory> LockoutService<U> {
    pub fn new(
        users: Arc<U>,
        config: LockoutConfig,
        events: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            config,
            events,
            clock,
        }
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Lock check on an already loaded record.
    pub fn is_record_locked(&self, record: &UserRecord) -> bool {
        self.config.enabled && record.is_locked()
    }

    pub async fn is_locked(&self, user_id: &UserId) -> Result<bool, Error> {
        Ok(self
            .users
            .find_by_id(user_id)
            .await?
            .is_some_and(|record| self.is_record_locked(&record)))
    }

    /// Count a failed login, locking the account when the threshold is reached.
    ///
    /// Returns an unlocked outcome without recording anything when protection is disabled.
    pub async fn record_failure(&self, user_id: &UserId) -> Result<FailureOutcome, Error> {
        if !self.config.enabled {
            return Ok(FailureOutcome {
                failed_attempts: 0,
                locked: false,
                remaining_attempts: self.config.max_failed_attempts,
            });
        }

        let now = self.clock.now();
        let state = self.users.increment_failed_attempts(user_id, now).await?;
        let failed_attempts = state.failed_login_attempts;

        self.events
            .publish(Event::LoginFailed {
                user_id: user_id.clone(),
                failed_attempts,
                timestamp: now,
            })
            .await;

        if failed_attempts < self.config.max_failed_attempts {
            return Ok(FailureOutcome {
                failed_attempts,
                locked: false,
                remaining_attempts: self.config.max_failed_attempts - failed_attempts,
            });
        }

        // Concurrent failures may all cross the threshold; only the one that
        // flips the flag reports the lock.
        if self.users.set_blocked(user_id, true).await? {
            tracing::warn!(
                user_id = %user_id,
                failed_attempts = failed_attempts,
                "Account locked after repeated failed logins"
            );
            self.events
                .publish(Event::AccountLocked {
                    user_id: user_id.clone(),
                    failed_attempts,
                    timestamp: now,
                })
                .await;
        }

        Ok(FailureOutcome {
            failed_attempts,
            locked: true,
            remaining_attempts: 0,
        })
    }

    /// Reset counters after a successful login.
    ///
    /// Returns `true` if there was anything to reset.
    pub async fn record_success(&self, user_id: &UserId) -> Result<bool, Error> {
        self.reset(user_id, UnlockReason::SuccessfulLogin).await
    }

    /// Administrative unblock.
    pub async fn unlock(&self, user_id: &UserId) -> Result<bool, Error> {
        self.reset(user_id, UnlockReason::AdminAction).await
    }

    async fn reset(&self, user_id: &UserId, reason: UnlockReason) -> Result<bool, Error> {
        let previous = self.users.reset_failed_attempts(user_id).await?;
        if !previous.is_dirty() {
            return Ok(false);
        }

        tracing::info!(user_id = %user_id, reason = ?reason, "Login attempt counters reset");
        self.events
            .publish(Event::AccountUnlocked {
                user_id: user_id.clone(),
                reason,
                timestamp: self.clock.now(),
            })
            .await;
        Ok(true)
    }
}
