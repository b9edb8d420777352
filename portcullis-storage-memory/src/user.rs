use std::{fmt, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use portcullis_core::{
    Clock, Error, LoginAttemptState, SystemClock, UserDirectory, UserId, UserRecord,
    error::StorageError,
    validation::normalize_email,
};

/// In-memory user directory.
///
/// Records are keyed by id with a secondary index from normalized email to id.
/// `updated_at` is stamped from the directory's clock.
pub struct MemoryUserDirectory {
    users: DashMap<UserId, UserRecord>,
    emails: DashMap<String, UserId>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryUserDirectory {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl fmt::Debug for MemoryUserDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryUserDirectory")
            .field("users", &self.users.len())
            .finish_non_exhaustive()
    }
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            users: DashMap::new(),
            emails: DashMap::new(),
            clock,
        }
    }

    /// Add an account. Fails if the email is already taken.
    pub fn insert(&self, mut record: UserRecord) -> Result<(), Error> {
        record.email = normalize_email(&record.email);

        match self.emails.entry(record.email.clone()) {
            Entry::Occupied(_) => Err(StorageError::Constraint(format!(
                "email already registered: {}",
                record.email
            ))
            .into()),
            Entry::Vacant(slot) => {
                slot.insert(record.id.clone());
                tracing::debug!(user_id = %record.id, "Inserted user");
                self.users.insert(record.id.clone(), record);
                Ok(())
            }
        }
    }

    /// Activate or deactivate an account
    pub fn set_active(&self, id: &UserId, is_active: bool) -> Result<(), Error> {
        self.update(id, |user| user.is_active = is_active)
    }

    pub fn remove(&self, id: &UserId) -> Option<UserRecord> {
        let (_, record) = self.users.remove(id)?;
        self.emails.remove(&record.email);
        Some(record)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn update<T>(&self, id: &UserId, f: impl FnOnce(&mut UserRecord) -> T) -> Result<T, Error> {
        let mut user = self.users.get_mut(id).ok_or(StorageError::NotFound)?;
        let result = f(&mut user);
        user.updated_at = self.clock.now();
        Ok(result)
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, Error> {
        let Some(id) = self.emails.get(&normalize_email(email)).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, Error> {
        Ok(self.users.get(id).map(|user| user.clone()))
    }

    async fn increment_failed_attempts(
        &self,
        id: &UserId,
        at: DateTime<Utc>,
    ) -> Result<LoginAttemptState, Error> {
        self.update(id, |user| {
            let state = &mut user.login_attempts;
            state.failed_login_attempts = state.failed_login_attempts.saturating_add(1);
            state.last_failed_login_at = Some(at);
            state.clone()
        })
    }

    async fn reset_failed_attempts(&self, id: &UserId) -> Result<LoginAttemptState, Error> {
        self.update(id, |user| std::mem::take(&mut user.login_attempts))
    }

    async fn set_blocked(&self, id: &UserId, blocked: bool) -> Result<bool, Error> {
        self.update(id, |user| {
            let state = &mut user.login_attempts;
            let changed = state.is_blocked_login_attempts != blocked;
            state.is_blocked_login_attempts = blocked;
            changed
        })
    }

    async fn set_password_hash(&self, id: &UserId, password_hash: &str) -> Result<(), Error> {
        self.update(id, |user| user.password_hash = password_hash.to_string())
    }
}
