use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, LoginAttemptState, UserId, UserRecord};

/// The user directory the engine authenticates against.
///
/// Account creation and profile management live elsewhere; the engine only
/// reads accounts and maintains their login-attempt counters and password hash.
///
/// # Concurrency
///
/// Counter updates must be atomic conditional updates in the backing store
/// (for example `UPDATE ... SET failed_login_attempts = failed_login_attempts + 1
/// RETURNING ...`), never an application-level read-modify-write. Concurrent
/// failures for the same account must each be counted.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Find a user by normalized (lower-case) email, active or not
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, Error>;

    /// Find a user by normalized email, ignoring inactive accounts
    async fn find_active_by_email(&self, email: &str) -> Result<Option<UserRecord>, Error> {
        Ok(self.find_by_email(email).await?.filter(|u| u.is_active))
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, Error>;

    /// Atomically increment `failed_login_attempts` and stamp `last_failed_login_at`.
    ///
    /// # Returns
    ///
    /// The state after the increment.
    async fn increment_failed_attempts(
        &self,
        id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<LoginAttemptState, Error>;

    /// Atomically reset the counter and the blocked flag.
    ///
    /// # Returns
    ///
    /// The state before the reset, so callers can tell whether anything changed.
    async fn reset_failed_attempts(&self, id: &UserId) -> Result<LoginAttemptState, Error>;

    /// Set the blocked flag.
    ///
    /// # Returns
    ///
    /// `true` if the stored value changed.
    async fn set_blocked(&self, id: &UserId, blocked: bool) -> Result<bool, Error>;

    async fn set_password_hash(&self, id: &UserId, password_hash: &str) -> Result<(), Error>;
}
