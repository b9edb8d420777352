//! Users, credentials and login-attempt state
//!
//! The user directory itself is an external collaborator (see
//! [`crate::repositories::UserDirectory`]); this module defines the shapes that
//! cross that boundary:
//!
//! | Type                  | Description                                                        |
//! | --------------------- | ------------------------------------------------------------------ |
//! | [`UserRecord`]        | The stored account, including the password hash and lockout state. |
//! | [`User`]              | The same account with sensitive fields stripped.                   |
//! | [`LoginAttemptState`] | Consecutive failed logins and the blocked flag.                    |
//! | [`AuthorizationClaims`] | Roles, permissions and tenant context snapshotted into tokens.   |
use crate::{
    Error,
    error::utilities::RequiredFieldExt,
    id::{USER_ID_PREFIX, generate_prefixed_id, validate_prefixed_id},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unique, stable identifier for a specific user
/// This value should be treated as opaque, and should not be used as a UUID even if it may look like one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> Self {
        UserId(id.to_string())
    }

    pub fn new_random() -> Self {
        UserId(generate_prefixed_id(USER_ID_PREFIX))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that this ID has the correct format for a generated user ID
    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, USER_ID_PREFIX)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authorization context carried inside access tokens.
///
/// Claims are a snapshot taken at issuance; they are only as fresh as the last
/// issuance or rotation and are never re-read per request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationClaims {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    /// Tenant (company) the user acts within
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl AuthorizationClaims {
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// Consecutive failed logins for one account.
///
/// `is_blocked_login_attempts` is true iff `failed_login_attempts` reached the
/// lockout threshold and no success or unblock happened since.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttemptState {
    pub failed_login_attempts: u32,
    pub last_failed_login_at: Option<DateTime<Utc>>,
    pub is_blocked_login_attempts: bool,
}

impl LoginAttemptState {
    /// True when there is anything for a successful login to reset
    pub fn is_dirty(&self) -> bool {
        self.failed_login_attempts > 0 || self.is_blocked_login_attempts
    }
}

/// A stored account as returned by the user directory.
///
/// Serializes every field, including the password hash, so a directory can
/// persist it as is. Hand [`User`] to anything outward facing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,

    /// Always stored lower-case
    pub email: String,

    /// bcrypt hash of the password
    pub password_hash: String,

    pub is_active: bool,

    pub login_attempts: LoginAttemptState,

    pub claims: AuthorizationClaims,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn builder() -> UserRecordBuilder {
        UserRecordBuilder::default()
    }

    pub fn is_locked(&self) -> bool {
        self.login_attempts.is_blocked_login_attempts
    }

    /// Strip sensitive fields
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            is_active: self.is_active,
            claims: self.claims.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// An authenticated account with sensitive fields removed. This is what
/// callers of the engine receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub is_active: bool,
    pub claims: AuthorizationClaims,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        record.to_user()
    }
}

#[derive(Default)]
pub struct UserRecordBuilder {
    id: Option<UserId>,
    email: Option<String>,
    password_hash: Option<String>,
    is_active: Option<bool>,
    login_attempts: Option<LoginAttemptState>,
    claims: Option<AuthorizationClaims>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl UserRecordBuilder {
    pub fn id(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn password_hash(mut self, password_hash: impl Into<String>) -> Self {
        self.password_hash = Some(password_hash.into());
        self
    }

    pub fn is_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn login_attempts(mut self, login_attempts: LoginAttemptState) -> Self {
        self.login_attempts = Some(login_attempts);
        self
    }

    pub fn claims(mut self, claims: AuthorizationClaims) -> Self {
        self.claims = Some(claims);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn build(self) -> Result<UserRecord, Error> {
        let now = Utc::now();
        Ok(UserRecord {
            id: self.id.unwrap_or_default(),
            email: crate::validation::normalize_email(&self.email.require_field("Email")?),
            password_hash: self.password_hash.require_field("Password hash")?,
            is_active: self.is_active.unwrap_or(true),
            login_attempts: self.login_attempts.unwrap_or_default(),
            claims: self.claims.unwrap_or_default(),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        })
    }
}
