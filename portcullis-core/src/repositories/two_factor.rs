use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error, UserId,
    two_factor::{EmailChallenge, TwoFactorFailure, TwoFactorKind, TwoFactorMethod},
};

/// Storage for per-user second-factor records.
///
/// Records are keyed by `(user_id, kind)`; there is at most one of each. Every
/// method that mutates counters, codes or challenges must be atomic per record
/// so that concurrent requests cannot double-spend a code or lose a failure.
#[async_trait]
pub trait TwoFactorRepository: Send + Sync + 'static {
    async fn find_method(
        &self,
        user_id: &UserId,
        kind: TwoFactorKind,
    ) -> Result<Option<TwoFactorMethod>, Error>;

    /// Insert or replace the record for `(method.user_id, method.kind)`
    async fn save_method(&self, method: &TwoFactorMethod) -> Result<(), Error>;

    async fn find_active_methods(&self, user_id: &UserId) -> Result<Vec<TwoFactorMethod>, Error>;

    /// Atomically count a failed verification.
    ///
    /// When the new count reaches `max_attempts`, `locked_until` is set to
    /// `lock_until` and returned in the result.
    async fn record_failure(
        &self,
        user_id: &UserId,
        kind: TwoFactorKind,
        max_attempts: u32,
        lock_until: DateTime<Utc>,
    ) -> Result<TwoFactorFailure, Error>;

    /// Reset the failure counter and lock, and stamp `last_used_at`.
    async fn record_success(
        &self,
        user_id: &UserId,
        kind: TwoFactorKind,
        at: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// Accept a TOTP time step only if it is later than the last accepted one.
    ///
    /// On success this behaves like [`record_success`](Self::record_success)
    /// and additionally stores `step` as `last_used_step`. Returns `false`
    /// (and changes nothing) for a replayed or older step.
    async fn claim_totp_step(&self, user_id: &UserId, step: u64, at: DateTime<Utc>)
    -> Result<bool, Error>;

    /// Activate a pending TOTP method, accepting `step` as its first code.
    ///
    /// Test-and-set on `is_active`: of concurrent activations exactly one
    /// returns `true`. The winner stores `step` as `last_used_step` and clears
    /// the failure counter and lock.
    async fn activate_totp(&self, user_id: &UserId, step: u64, at: DateTime<Utc>)
    -> Result<bool, Error>;

    /// Mark the unused backup code with this digest as used.
    ///
    /// Test-and-set: of any number of concurrent calls with the same digest,
    /// exactly one returns `true`.
    async fn consume_backup_code(
        &self,
        user_id: &UserId,
        code_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, Error>;

    /// Store a new email challenge, replacing any pending one
    async fn set_email_challenge(
        &self,
        user_id: &UserId,
        challenge: EmailChallenge,
    ) -> Result<(), Error>;

    /// Clear the pending email challenge if its digest matches and it has not expired.
    ///
    /// Test-and-set like [`consume_backup_code`](Self::consume_backup_code).
    async fn consume_email_challenge(
        &self,
        user_id: &UserId,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, Error>;
}
