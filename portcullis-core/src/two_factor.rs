//! Second-factor methods
//!
//! Each user has at most one record per [`TwoFactorKind`]. A record moves
//! through `Enrolled → Active ⇄ Locked` and may be `Disabled` at any point.
//! Backup codes live on their own record of kind [`TwoFactorKind::Backup`],
//! created when TOTP is activated.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorKind {
    Totp,
    Email,
    Backup,
}

impl std::fmt::Display for TwoFactorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TwoFactorKind::Totp => write!(f, "totp"),
            TwoFactorKind::Email => write!(f, "email"),
            TwoFactorKind::Backup => write!(f, "backup"),
        }
    }
}

/// Derived lifecycle state of a method record at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoFactorState {
    /// Enrolled but never verified
    Enrolled,
    Active,
    Locked { until: DateTime<Utc> },
    Disabled,
}

/// A single-use recovery code. Only the SHA-256 digest of the normalized code is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupCode {
    pub code_hash: String,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl BackupCode {
    pub fn new(code_hash: String) -> Self {
        Self {
            code_hash,
            used: false,
            used_at: None,
        }
    }
}

/// A pending email one-time code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailChallenge {
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of an atomic failure increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoFactorFailure {
    pub failed_attempts: u32,
    /// Set when this failure crossed the threshold
    pub locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoFactorMethod {
    pub user_id: UserId,
    pub kind: TwoFactorKind,

    /// Base32 TOTP secret
    pub secret: Option<String>,

    /// Where email codes are delivered
    pub destination: Option<String>,

    pub is_active: bool,
    pub is_verified: bool,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,

    /// Last accepted TOTP time step; codes at or before it are replays
    pub last_used_step: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backup_codes: Vec<BackupCode>,

    pub email_challenge: Option<EmailChallenge>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TwoFactorMethod {
    fn blank(user_id: UserId, kind: TwoFactorKind, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            kind,
            secret: None,
            destination: None,
            is_active: false,
            is_verified: false,
            failed_attempts: 0,
            locked_until: None,
            last_used_at: None,
            last_used_step: None,
            backup_codes: Vec::new(),
            email_challenge: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A freshly enrolled, not yet activated TOTP method.
    pub fn new_totp(user_id: UserId, secret: String, now: DateTime<Utc>) -> Self {
        Self {
            secret: Some(secret),
            ..Self::blank(user_id, TwoFactorKind::Totp, now)
        }
    }

    /// A freshly enrolled, not yet activated email method.
    pub fn new_email(user_id: UserId, destination: String, now: DateTime<Utc>) -> Self {
        Self {
            destination: Some(destination),
            ..Self::blank(user_id, TwoFactorKind::Email, now)
        }
    }

    /// An active backup-code set.
    pub fn new_backup(user_id: UserId, code_hashes: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            is_active: true,
            is_verified: true,
            backup_codes: code_hashes.into_iter().map(BackupCode::new).collect(),
            ..Self::blank(user_id, TwoFactorKind::Backup, now)
        }
    }

    pub fn locked_until_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.locked_until.filter(|until| *until > now)
    }

    pub fn state(&self, now: DateTime<Utc>) -> TwoFactorState {
        if let Some(until) = self.locked_until_at(now) {
            return TwoFactorState::Locked { until };
        }
        match (self.is_active, self.is_verified) {
            (true, _) => TwoFactorState::Active,
            (false, false) => TwoFactorState::Enrolled,
            (false, true) => TwoFactorState::Disabled,
        }
    }

    pub fn remaining_backup_codes(&self) -> usize {
        self.backup_codes.iter().filter(|c| !c.used).count()
    }
}

/// Policy for second-factor verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoFactorConfig {
    /// Label shown by authenticator apps
    pub issuer: String,
    pub totp_step_secs: u64,
    pub totp_digits: u32,
    /// Accepted clock skew, in steps, on either side of now
    pub totp_skew_steps: u64,
    pub max_failed_attempts: u32,
    pub lockout_secs: i64,
    pub email_code_ttl_secs: i64,
    pub email_code_digits: u32,
    pub backup_code_count: usize,
}

impl Default for TwoFactorConfig {
    fn default() -> Self {
        Self {
            issuer: "Portcullis".to_string(),
            totp_step_secs: 30,
            totp_digits: 6,
            totp_skew_steps: 2,
            max_failed_attempts: 5,
            lockout_secs: 30 * 60,
            email_code_ttl_secs: 10 * 60,
            email_code_digits: 6,
            backup_code_count: 10,
        }
    }
}

impl TwoFactorConfig {
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_max_failed_attempts(mut self, max_failed_attempts: u32) -> Self {
        self.max_failed_attempts = max_failed_attempts;
        self
    }

    pub fn with_lockout(mut self, lockout: Duration) -> Self {
        self.lockout_secs = lockout.num_seconds();
        self
    }

    pub fn with_email_code_ttl(mut self, ttl: Duration) -> Self {
        self.email_code_ttl_secs = ttl.num_seconds();
        self
    }

    pub fn with_totp_skew_steps(mut self, steps: u64) -> Self {
        self.totp_skew_steps = steps;
        self
    }

    pub fn lockout(&self) -> Duration {
        Duration::seconds(self.lockout_secs)
    }

    pub fn email_code_ttl(&self) -> Duration {
        Duration::seconds(self.email_code_ttl_secs)
    }

    /// Overrides from `PORTCULLIS_2FA_*`; unset or malformed values keep the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            issuer: std::env::var("PORTCULLIS_2FA_ISSUER").unwrap_or(defaults.issuer),
            max_failed_attempts: std::env::var("PORTCULLIS_2FA_MAX_FAILED_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_failed_attempts),
            lockout_secs: std::env::var("PORTCULLIS_2FA_LOCKOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.lockout_secs),
            email_code_ttl_secs: std::env::var("PORTCULLIS_2FA_EMAIL_CODE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.email_code_ttl_secs),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let mut method = TwoFactorMethod::new_totp(UserId::new("usr_1"), "SECRET".into(), now());
        assert_eq!(method.state(now()), TwoFactorState::Enrolled);

        method.is_active = true;
        method.is_verified = true;
        assert_eq!(method.state(now()), TwoFactorState::Active);

        let until = now() + Duration::minutes(30);
        method.locked_until = Some(until);
        assert_eq!(method.state(now()), TwoFactorState::Locked { until });
        assert_eq!(method.state(until), TwoFactorState::Active);

        method.is_active = false;
        assert_eq!(method.state(until), TwoFactorState::Disabled);
    }

    #[test]
    fn test_remaining_backup_codes() {
        let mut method = TwoFactorMethod::new_backup(
            UserId::new("usr_1"),
            vec!["a".into(), "b".into(), "c".into()],
            now(),
        );
        assert_eq!(method.remaining_backup_codes(), 3);
        method.backup_codes[1].used = true;
        assert_eq!(method.remaining_backup_codes(), 2);
    }

    #[test]
    fn test_method_survives_serde_round_trip() {
        let mut method = TwoFactorMethod::new_totp(UserId::new("usr_1"), "JBSWY3DPEHPK3PXP".into(), now());
        method.last_used_step = Some(42);
        let json = serde_json::to_string(&method).unwrap();
        assert!(json.contains("\"kind\":\"totp\""));
        let restored: TwoFactorMethod = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, method);

        let mut email = TwoFactorMethod::new_email(UserId::new("usr_1"), "a@x.com".into(), now());
        email.email_challenge = Some(EmailChallenge {
            code_hash: "digest".into(),
            expires_at: now() + Duration::minutes(10),
        });
        let restored: TwoFactorMethod =
            serde_json::from_str(&serde_json::to_string(&email).unwrap()).unwrap();
        assert_eq!(restored.email_challenge, email.email_challenge);
    }
}
