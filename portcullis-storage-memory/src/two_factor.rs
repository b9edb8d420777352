use std::{fmt, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use portcullis_core::{
    Clock, Error, SystemClock, TwoFactorKind, TwoFactorMethod, TwoFactorRepository, UserId,
    error::StorageError,
    two_factor::{EmailChallenge, TwoFactorFailure},
};

/// In-memory second-factor store keyed by `(user_id, kind)`.
pub struct MemoryTwoFactorRepository {
    methods: DashMap<(UserId, TwoFactorKind), TwoFactorMethod>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryTwoFactorRepository {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl fmt::Debug for MemoryTwoFactorRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTwoFactorRepository")
            .field("methods", &self.methods.len())
            .finish_non_exhaustive()
    }
}

impl MemoryTwoFactorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `updated_at` from `clock` instead of wall-clock time
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            methods: DashMap::new(),
            clock,
        }
    }

    fn update<T>(
        &self,
        user_id: &UserId,
        kind: TwoFactorKind,
        f: impl FnOnce(&mut TwoFactorMethod) -> T,
    ) -> Result<T, Error> {
        let mut method = self
            .methods
            .get_mut(&(user_id.clone(), kind))
            .ok_or(StorageError::NotFound)?;
        let result = f(&mut method);
        method.updated_at = self.clock.now();
        Ok(result)
    }
}

#[async_trait]
impl TwoFactorRepository for MemoryTwoFactorRepository {
    async fn find_method(
        &self,
        user_id: &UserId,
        kind: TwoFactorKind,
    ) -> Result<Option<TwoFactorMethod>, Error> {
        Ok(self
            .methods
            .get(&(user_id.clone(), kind))
            .map(|method| method.clone()))
    }

    async fn save_method(&self, method: &TwoFactorMethod) -> Result<(), Error> {
        self.methods
            .insert((method.user_id.clone(), method.kind), method.clone());
        Ok(())
    }

    async fn find_active_methods(&self, user_id: &UserId) -> Result<Vec<TwoFactorMethod>, Error> {
        let methods = [TwoFactorKind::Totp, TwoFactorKind::Email, TwoFactorKind::Backup]
            .into_iter()
            .filter_map(|kind| self.methods.get(&(user_id.clone(), kind)))
            .filter(|method| method.is_active)
            .map(|method| method.clone())
            .collect();
        Ok(methods)
    }

    async fn record_failure(
        &self,
        user_id: &UserId,
        kind: TwoFactorKind,
        max_attempts: u32,
        lock_until: DateTime<Utc>,
    ) -> Result<TwoFactorFailure, Error> {
        self.update(user_id, kind, |method| {
            method.failed_attempts = method.failed_attempts.saturating_add(1);
            let locked_until = (method.failed_attempts >= max_attempts).then_some(lock_until);
            if locked_until.is_some() {
                method.locked_until = locked_until;
            }
            TwoFactorFailure {
                failed_attempts: method.failed_attempts,
                locked_until,
            }
        })
    }

    async fn record_success(
        &self,
        user_id: &UserId,
        kind: TwoFactorKind,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.update(user_id, kind, |method| {
            method.failed_attempts = 0;
            method.locked_until = None;
            method.last_used_at = Some(at);
        })
    }

    async fn claim_totp_step(
        &self,
        user_id: &UserId,
        step: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.update(user_id, TwoFactorKind::Totp, |method| {
            if method.last_used_step.is_some_and(|last| step <= last) {
                return false;
            }
            method.last_used_step = Some(step);
            method.failed_attempts = 0;
            method.locked_until = None;
            method.last_used_at = Some(at);
            true
        })
    }

    async fn activate_totp(
        &self,
        user_id: &UserId,
        step: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.update(user_id, TwoFactorKind::Totp, |method| {
            if method.is_active {
                return false;
            }
            method.is_active = true;
            method.is_verified = true;
            method.last_used_step = Some(step);
            method.failed_attempts = 0;
            method.locked_until = None;
            method.last_used_at = Some(at);
            true
        })
    }

    async fn consume_backup_code(
        &self,
        user_id: &UserId,
        code_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.update(user_id, TwoFactorKind::Backup, |method| {
            let Some(code) = method
                .backup_codes
                .iter_mut()
                .find(|code| !code.used && code.code_hash == code_hash)
            else {
                return false;
            };
            code.used = true;
            code.used_at = Some(at);
            true
        })
    }

    async fn set_email_challenge(
        &self,
        user_id: &UserId,
        challenge: EmailChallenge,
    ) -> Result<(), Error> {
        self.update(user_id, TwoFactorKind::Email, |method| {
            method.email_challenge = Some(challenge);
        })
    }

    async fn consume_email_challenge(
        &self,
        user_id: &UserId,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.update(user_id, TwoFactorKind::Email, |method| {
            let valid = method
                .email_challenge
                .as_ref()
                .is_some_and(|challenge| {
                    challenge.code_hash == code_hash && challenge.expires_at > now
                });
            if valid {
                method.email_challenge = None;
            }
            valid
        })
    }
}
