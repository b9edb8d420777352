//! In-module mock repositories shared by the service tests
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error, LoginAttemptState, UserId, UserRecord,
    error::StorageError,
    repositories::{TwoFactorRepository, UserDirectory},
    two_factor::{EmailChallenge, TwoFactorFailure, TwoFactorKind, TwoFactorMethod},
};

/// bcrypt at the minimum cost, for fixtures only
pub fn fast_hash(password: &str) -> String {
    bcrypt::hash(password, 4).unwrap()
}

#[derive(Default)]
pub struct MockUserDirectory {
    users: Mutex<HashMap<UserId, UserRecord>>,
}

impl MockUserDirectory {
    pub fn insert(&self, record: UserRecord) {
        self.users.lock().unwrap().insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &UserId) -> Option<UserRecord> {
        self.users.lock().unwrap().get(id).cloned()
    }

    fn update<T>(
        &self,
        id: &UserId,
        f: impl FnOnce(&mut UserRecord) -> T,
    ) -> Result<T, Error> {
        let mut users = self.users.lock().unwrap();
        let record = users.get_mut(id).ok_or(StorageError::NotFound)?;
        Ok(f(record))
    }
}

#[async_trait]
impl UserDirectory for MockUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, Error> {
        Ok(self.get(id))
    }

    async fn increment_failed_attempts(
        &self,
        id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<LoginAttemptState, Error> {
        self.update(id, |u| {
            u.login_attempts.failed_login_attempts += 1;
            u.login_attempts.last_failed_login_at = Some(at);
            u.login_attempts.clone()
        })
    }

    async fn reset_failed_attempts(&self, id: &UserId) -> Result<LoginAttemptState, Error> {
        self.update(id, |u| std::mem::take(&mut u.login_attempts))
    }

    async fn set_blocked(&self, id: &UserId, blocked: bool) -> Result<bool, Error> {
        self.update(id, |u| {
            let changed = u.login_attempts.is_blocked_login_attempts != blocked;
            u.login_attempts.is_blocked_login_attempts = blocked;
            changed
        })
    }

    async fn set_password_hash(&self, id: &UserId, password_hash: &str) -> Result<(), Error> {
        self.update(id, |u| u.password_hash = password_hash.to_string())
    }
}

#[derive(Default)]
pub struct MockTwoFactorRepository {
    methods: Mutex<HashMap<(UserId, TwoFactorKind), TwoFactorMethod>>,
}

impl MockTwoFactorRepository {
    pub fn get(&self, user_id: &UserId, kind: TwoFactorKind) -> Option<TwoFactorMethod> {
        self.methods
            .lock()
            .unwrap()
            .get(&(user_id.clone(), kind))
            .cloned()
    }

    fn update<T>(
        &self,
        user_id: &UserId,
        kind: TwoFactorKind,
        f: impl FnOnce(&mut TwoFactorMethod) -> T,
    ) -> Result<T, Error> {
        let mut methods = self.methods.lock().unwrap();
        let method = methods
            .get_mut(&(user_id.clone(), kind))
            .ok_or(StorageError::NotFound)?;
        Ok(f(method))
    }
}

#[async_trait]
impl TwoFactorRepository for MockTwoFactorRepository {
    async fn find_method(
        &self,
        user_id: &UserId,
        kind: TwoFactorKind,
    ) -> Result<Option<TwoFactorMethod>, Error> {
        Ok(self.get(user_id, kind))
    }

    async fn save_method(&self, method: &TwoFactorMethod) -> Result<(), Error> {
        self.methods
            .lock()
            .unwrap()
            .insert((method.user_id.clone(), method.kind), method.clone());
        Ok(())
    }

    async fn find_active_methods(&self, user_id: &UserId) -> Result<Vec<TwoFactorMethod>, Error> {
        Ok(self
            .methods
            .lock()
            .unwrap()
            .values()
            .filter(|m| &m.user_id == user_id && m.is_active)
            .cloned()
            .collect())
    }

    async fn record_failure(
        &self,
        user_id: &UserId,
        kind: TwoFactorKind,
        max_attempts: u32,
        lock_until: DateTime<Utc>,
    ) -> Result<TwoFactorFailure, Error> {
        self.update(user_id, kind, |m| {
            m.failed_attempts += 1;
            let locked_until = (m.failed_attempts >= max_attempts).then_some(lock_until);
            if locked_until.is_some() {
                m.locked_until = locked_until;
            }
            TwoFactorFailure {
                failed_attempts: m.failed_attempts,
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
        self.update(user_id, kind, |m| {
            m.failed_attempts = 0;
            m.locked_until = None;
            m.last_used_at = Some(at);
        })
    }

    async fn claim_totp_step(
        &self,
        user_id: &UserId,
        step: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.update(user_id, TwoFactorKind::Totp, |m| {
            if m.last_used_step.is_some_and(|last| step <= last) {
                return false;
            }
            m.last_used_step = Some(step);
            m.failed_attempts = 0;
            m.locked_until = None;
            m.last_used_at = Some(at);
            true
        })
    }

    async fn activate_totp(
        &self,
        user_id: &UserId,
        step: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.update(user_id, TwoFactorKind::Totp, |m| {
            if m.is_active {
                return false;
            }
            m.is_active = true;
            m.is_verified = true;
            m.last_used_step = Some(step);
            m.failed_attempts = 0;
            m.locked_until = None;
            m.last_used_at = Some(at);
            true
        })
    }

    async fn consume_backup_code(
        &self,
        user_id: &UserId,
        code_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.update(user_id, TwoFactorKind::Backup, |m| {
            match m
                .backup_codes
                .iter_mut()
                .find(|c| !c.used && c.code_hash == code_hash)
            {
                Some(code) => {
                    code.used = true;
                    code.used_at = Some(at);
                    true
                }
                None => false,
            }
        })
    }

    async fn set_email_challenge(
        &self,
        user_id: &UserId,
        challenge: EmailChallenge,
    ) -> Result<(), Error> {
        self.update(user_id, TwoFactorKind::Email, |m| {
            m.email_challenge = Some(challenge)
        })
    }

    async fn consume_email_challenge(
        &self,
        user_id: &UserId,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.update(user_id, TwoFactorKind::Email, |m| {
            let matches = m
                .email_challenge
                .as_ref()
                .is_some_and(|c| c.code_hash == code_hash && c.expires_at > now);
            if matches {
                m.email_challenge = None;
            }
            matches
        })
    }
}
