//! Second-factor enrollment and verification
//!
//! Three kinds are supported:
//!
//! | Kind     | Enrollment                                    | Verification                           |
//! | -------- | --------------------------------------------- | -------------------------------------- |
//! | `totp`   | secret + provisioning URI, activated by code  | RFC 6238 code within the skew window   |
//! | `email`  | destination, activated by the first code      | 6-digit code, 10 minutes, single use   |
//! | `backup` | 10 codes created when TOTP is activated       | each code usable once                  |
//!
//! Every kind shares the same failure policy: consecutive failures are counted
//! per method and at the threshold the method is locked for a fixed period.
//! While locked, verification fails fast without looking at the code.
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    Error, UserId,
    clock::Clock,
    crypto::{generate_backup_code, generate_numeric_code, hash_token, normalize_backup_code},
    error::AuthError,
    events::{Event, EventBus},
    notification::NotificationSender,
    repositories::TwoFactorRepository,
    two_factor::{EmailChallenge, TwoFactorConfig, TwoFactorKind, TwoFactorMethod},
    validation::{normalize_email, validate_email},
};

use super::totp::{TotpEnrollment, TotpGenerator};

pub struct TwoFactorService<R: TwoFactorRepository> {
    repository: Arc<R>,
    notifier: Arc<dyn NotificationSender>,
    totp: TotpGenerator,
    config: TwoFactorConfig,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl<R: TwoFactorRepository> TwoFactorService<R> {
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<dyn NotificationSender>,
        config: TwoFactorConfig,
        events: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            notifier,
            totp: TotpGenerator::new(&config),
            config,
            events,
            clock,
        }
    }

    pub fn config(&self) -> &TwoFactorConfig {
        &self.config
    }

    pub fn totp(&self) -> &TotpGenerator {
        &self.totp
    }

    /// True if the user has an active TOTP or email method.
    ///
    /// Backup codes alone never gate a login.
    pub async fn has_active_two_factor(&self, user_id: &UserId) -> Result<bool, Error> {
        Ok(self
            .active_methods(user_id)
            .await?
            .iter()
            .any(|kind| *kind != TwoFactorKind::Backup))
    }

    pub async fn active_methods(&self, user_id: &UserId) -> Result<Vec<TwoFactorKind>, Error> {
        let mut kinds: Vec<TwoFactorKind> = self
            .repository
            .find_active_methods(user_id)
            .await?
            .into_iter()
            .map(|m| m.kind)
            .collect();
        kinds.sort_by_key(|kind| *kind as u8);
        Ok(kinds)
    }

    // ------------------------------------------------------------------
    // TOTP
    // ------------------------------------------------------------------

    /// Start TOTP enrollment, replacing any unverified or disabled TOTP record.
    pub async fn enroll_totp(
        &self,
        user_id: &UserId,
        account: &str,
    ) -> Result<TotpEnrollment, Error> {
        if self.find_active(user_id, TwoFactorKind::Totp).await?.is_some() {
            return Err(AuthError::TwoFactorAlreadyEnabled.into());
        }

        let enrollment = self.totp.enroll(account)?;
        let method =
            TwoFactorMethod::new_totp(user_id.clone(), enrollment.secret.clone(), self.clock.now());
        self.repository.save_method(&method).await?;

        tracing::info!(user_id = %user_id, "TOTP enrollment started");
        Ok(enrollment)
    }

    /// Confirm enrollment with a first valid code.
    ///
    /// # Returns
    ///
    /// The plaintext backup codes. They are not retrievable again.
    pub async fn activate_totp(&self, user_id: &UserId, code: &str) -> Result<Vec<String>, Error> {
        let method = self
            .repository
            .find_method(user_id, TwoFactorKind::Totp)
            .await?
            .ok_or(AuthError::TwoFactorNotEnabled)?;
        if method.is_active {
            return Err(AuthError::TwoFactorAlreadyEnabled.into());
        }

        let now = self.clock.now();
        self.ensure_unlocked(&method, now)?;

        let secret = method
            .secret
            .as_deref()
            .ok_or(AuthError::TwoFactorNotEnabled)?;
        let Some(step) = self.totp.matching_step(secret, code, now)? else {
            self.record_failure(user_id, TwoFactorKind::Totp).await?;
            return Err(AuthError::TwoFactorInvalid.into());
        };

        if !self.repository.activate_totp(user_id, step, now).await? {
            // Another activation with the same code got there first
            return Err(AuthError::TwoFactorAlreadyEnabled.into());
        }

        let codes = self.replace_backup_codes(user_id, now).await?;

        tracing::info!(user_id = %user_id, "TOTP activated");
        self.events
            .publish(Event::TwoFactorEnabled {
                user_id: user_id.clone(),
                kind: TwoFactorKind::Totp,
                timestamp: now,
            })
            .await;

        Ok(codes)
    }

    /// Check a TOTP code for an active method.
    ///
    /// A code for a time step at or before the last accepted one is a replay
    /// and counts as a failure.
    pub async fn verify_totp(&self, user_id: &UserId, code: &str) -> Result<bool, Error> {
        let method = self
            .find_active(user_id, TwoFactorKind::Totp)
            .await?
            .ok_or(AuthError::TwoFactorNotEnabled)?;

        let now = self.clock.now();
        self.ensure_unlocked(&method, now)?;

        let secret = method
            .secret
            .as_deref()
            .ok_or(AuthError::TwoFactorNotEnabled)?;
        let accepted = match self.totp.matching_step(secret, code, now)? {
            Some(step) => self.repository.claim_totp_step(user_id, step, now).await?,
            None => false,
        };

        if !accepted {
            self.record_failure(user_id, TwoFactorKind::Totp).await?;
        }
        Ok(accepted)
    }

    // ------------------------------------------------------------------
    // Email one-time codes
    // ------------------------------------------------------------------

    /// Register an email destination and send the first code.
    ///
    /// The method becomes active on the first successful [`verify_email_code`](Self::verify_email_code).
    pub async fn enroll_email(
        &self,
        user_id: &UserId,
        destination: &str,
    ) -> Result<DateTime<Utc>, Error> {
        let destination = normalize_email(destination);
        validate_email(&destination)?;

        if self.find_active(user_id, TwoFactorKind::Email).await?.is_some() {
            return Err(AuthError::TwoFactorAlreadyEnabled.into());
        }

        let method = TwoFactorMethod::new_email(user_id.clone(), destination, self.clock.now());
        self.repository.save_method(&method).await?;

        self.send_email_code(user_id).await
    }

    /// Generate and dispatch a fresh code, replacing any pending one.
    ///
    /// Delivery failures are logged; the code is stored either way.
    pub async fn send_email_code(&self, user_id: &UserId) -> Result<DateTime<Utc>, Error> {
        let method = self
            .repository
            .find_method(user_id, TwoFactorKind::Email)
            .await?
            .filter(|m| m.is_active || !m.is_verified)
            .ok_or(AuthError::TwoFactorNotEnabled)?;

        let now = self.clock.now();
        self.ensure_unlocked(&method, now)?;

        let code = generate_numeric_code(self.config.email_code_digits);
        let expires_at = now + self.config.email_code_ttl();
        self.repository
            .set_email_challenge(
                user_id,
                EmailChallenge {
                    code_hash: hash_token(&code),
                    expires_at,
                },
            )
            .await?;

        let destination = method.destination.unwrap_or_default();
        if let Err(e) = self
            .notifier
            .send_two_factor_code(&destination, &code, expires_at)
            .await
        {
            tracing::error!(error = %e, user_id = %user_id, "Failed to send two-factor code");
        }

        Ok(expires_at)
    }

    pub async fn verify_email_code(&self, user_id: &UserId, code: &str) -> Result<bool, Error> {
        let method = self
            .repository
            .find_method(user_id, TwoFactorKind::Email)
            .await?
            .filter(|m| m.is_active || !m.is_verified)
            .ok_or(AuthError::TwoFactorNotEnabled)?;

        let now = self.clock.now();
        self.ensure_unlocked(&method, now)?;

        let consumed = self
            .repository
            .consume_email_challenge(user_id, &hash_token(code.trim()), now)
            .await?;
        if !consumed {
            self.record_failure(user_id, TwoFactorKind::Email).await?;
            return Ok(false);
        }

        self.repository
            .record_success(user_id, TwoFactorKind::Email, now)
            .await?;

        if !method.is_active {
            // Re-read so the activation does not clobber the success just recorded
            if let Some(mut method) = self
                .repository
                .find_method(user_id, TwoFactorKind::Email)
                .await?
            {
                method.is_active = true;
                method.is_verified = true;
                method.updated_at = now;
                self.repository.save_method(&method).await?;
            }

            tracing::info!(user_id = %user_id, "Email two-factor activated");
            self.events
                .publish(Event::TwoFactorEnabled {
                    user_id: user_id.clone(),
                    kind: TwoFactorKind::Email,
                    timestamp: now,
                })
                .await;
        }

        Ok(true)
    }

    // ------------------------------------------------------------------
    // Backup codes
    // ------------------------------------------------------------------

    /// Spend a backup code. Of concurrent submissions of one code, exactly one succeeds.
    pub async fn verify_backup_code(&self, user_id: &UserId, code: &str) -> Result<bool, Error> {
        let method = self
            .find_active(user_id, TwoFactorKind::Backup)
            .await?
            .ok_or(AuthError::TwoFactorNotEnabled)?;

        let now = self.clock.now();
        self.ensure_unlocked(&method, now)?;

        let code_hash = hash_token(&normalize_backup_code(code));
        if !self
            .repository
            .consume_backup_code(user_id, &code_hash, now)
            .await?
        {
            self.record_failure(user_id, TwoFactorKind::Backup).await?;
            return Ok(false);
        }

        self.repository
            .record_success(user_id, TwoFactorKind::Backup, now)
            .await?;

        let remaining = self.remaining_backup_codes(user_id).await?;
        tracing::info!(user_id = %user_id, remaining = remaining, "Backup code used");
        self.events
            .publish(Event::BackupCodeUsed {
                user_id: user_id.clone(),
                remaining,
                timestamp: now,
            })
            .await;

        Ok(true)
    }

    /// Replace every backup code. Requires active TOTP.
    pub async fn regenerate_backup_codes(&self, user_id: &UserId) -> Result<Vec<String>, Error> {
        if self.find_active(user_id, TwoFactorKind::Totp).await?.is_none() {
            return Err(AuthError::TwoFactorNotEnabled.into());
        }
        self.replace_backup_codes(user_id, self.clock.now()).await
    }

    pub async fn remaining_backup_codes(&self, user_id: &UserId) -> Result<usize, Error> {
        Ok(self
            .find_active(user_id, TwoFactorKind::Backup)
            .await?
            .map(|m| m.remaining_backup_codes())
            .unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Shared
    // ------------------------------------------------------------------

    /// Verify a code for an active method of any kind.
    ///
    /// Unlike [`verify_email_code`](Self::verify_email_code) this never
    /// completes a pending email enrollment.
    pub async fn verify(
        &self,
        user_id: &UserId,
        kind: TwoFactorKind,
        code: &str,
    ) -> Result<bool, Error> {
        if self.find_active(user_id, kind).await?.is_none() {
            return Err(AuthError::TwoFactorNotEnabled.into());
        }
        match kind {
            TwoFactorKind::Totp => self.verify_totp(user_id, code).await,
            TwoFactorKind::Email => self.verify_email_code(user_id, code).await,
            TwoFactorKind::Backup => self.verify_backup_code(user_id, code).await,
        }
    }

    /// Disable an active method. Disabling TOTP also disables its backup codes.
    pub async fn disable(&self, user_id: &UserId, kind: TwoFactorKind) -> Result<(), Error> {
        let method = self
            .find_active(user_id, kind)
            .await?
            .ok_or(AuthError::TwoFactorNotEnabled)?;

        let now = self.clock.now();
        self.deactivate(method, now).await?;

        if kind == TwoFactorKind::Totp {
            if let Some(backup) = self.find_active(user_id, TwoFactorKind::Backup).await? {
                self.deactivate(backup, now).await?;
            }
        }

        tracing::info!(user_id = %user_id, kind = %kind, "Two-factor method disabled");
        self.events
            .publish(Event::TwoFactorDisabled {
                user_id: user_id.clone(),
                kind,
                timestamp: now,
            })
            .await;
        Ok(())
    }

    async fn deactivate(&self, mut method: TwoFactorMethod, now: DateTime<Utc>) -> Result<(), Error> {
        method.is_active = false;
        method.secret = None;
        method.email_challenge = None;
        method.backup_codes.clear();
        method.updated_at = now;
        self.repository.save_method(&method).await
    }

    async fn find_active(
        &self,
        user_id: &UserId,
        kind: TwoFactorKind,
    ) -> Result<Option<TwoFactorMethod>, Error> {
        Ok(self
            .repository
            .find_method(user_id, kind)
            .await?
            .filter(|m| m.is_active))
    }

    async fn replace_backup_codes(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, Error> {
        let codes: Vec<String> = (0..self.config.backup_code_count)
            .map(|_| generate_backup_code())
            .collect();
        let hashes = codes
            .iter()
            .map(|code| hash_token(&normalize_backup_code(code)))
            .collect();

        self.repository
            .save_method(&TwoFactorMethod::new_backup(user_id.clone(), hashes, now))
            .await?;
        Ok(codes)
    }

    fn ensure_unlocked(&self, method: &TwoFactorMethod, now: DateTime<Utc>) -> Result<(), Error> {
        match method.locked_until_at(now) {
            Some(until) => Err(AuthError::TwoFactorLocked { until }.into()),
            None => Ok(()),
        }
    }

    async fn record_failure(&self, user_id: &UserId, kind: TwoFactorKind) -> Result<(), Error> {
        let now = self.clock.now();
        let failure = self
            .repository
            .record_failure(
                user_id,
                kind,
                self.config.max_failed_attempts,
                now + self.config.lockout(),
            )
            .await?;

        self.events
            .publish(Event::TwoFactorFailed {
                user_id: user_id.clone(),
                kind,
                failed_attempts: failure.failed_attempts,
                timestamp: now,
            })
            .await;

        if let Some(locked_until) = failure.locked_until {
            tracing::warn!(
                user_id = %user_id,
                kind = %kind,
                failed_attempts = failure.failed_attempts,
                "Two-factor method locked after repeated failures"
            );
            self.events
                .publish(Event::TwoFactorLocked {
                    user_id: user_id.clone(),
                    kind,
                    locked_until,
                    timestamp: now,
                })
                .await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::{
        clock::ManualClock, error::NotificationError, services::mock::MockTwoFactorRepository,
    };

    #[derive(Default)]
    struct CapturingSender {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl CapturingSender {
        fn last_code(&self) -> String {
            self.sent.lock().unwrap().last().unwrap().1.clone()
        }
    }

    #[async_trait]
    impl NotificationSender for CapturingSender {
        async fn send_two_factor_code(
            &self,
            destination: &str,
            code: &str,
            _expires_at: DateTime<Utc>,
        ) -> Result<(), NotificationError> {
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), code.to_string()));
            if self.fail {
                return Err(NotificationError::Delivery("smtp down".into()));
            }
            Ok(())
        }
    }

    struct Fixture {
        service: TwoFactorService<MockTwoFactorRepository>,
        repository: Arc<MockTwoFactorRepository>,
        sender: Arc<CapturingSender>,
        clock: ManualClock,
        user_id: UserId,
    }

    fn fixture_with(sender: CapturingSender) -> Fixture {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap());
        let repository = Arc::new(MockTwoFactorRepository::default());
        let sender = Arc::new(sender);
        let service = TwoFactorService::new(
            repository.clone(),
            sender.clone(),
            TwoFactorConfig::default(),
            EventBus::default(),
            Arc::new(clock.clone()),
        );
        Fixture {
            service,
            repository,
            sender,
            clock,
            user_id: UserId::new_random(),
        }
    }

    fn fixture() -> Fixture {
        fixture_with(CapturingSender::default())
    }

    impl Fixture {
        fn current_code(&self, secret: &str) -> String {
            self.service
                .totp()
                .code_at(secret, self.clock.now())
                .unwrap()
        }

        async fn activated_totp(&self) -> (String, Vec<String>) {
            let enrollment = self
                .service
                .enroll_totp(&self.user_id, "a@x.com")
                .await
                .unwrap();
            let code = self.current_code(&enrollment.secret);
            let backup = self
                .service
                .activate_totp(&self.user_id, &code)
                .await
                .unwrap();
            // Move past the activation step so the next code is not a replay
            self.clock.advance(Duration::seconds(30));
            (enrollment.secret, backup)
        }
    }

    #[tokio::test]
    async fn test_totp_activation_issues_backup_codes() {
        let f = fixture();
        assert!(!f.service.has_active_two_factor(&f.user_id).await.unwrap());

        let (_secret, backup) = f.activated_totp().await;
        assert_eq!(backup.len(), 10);
        assert!(f.service.has_active_two_factor(&f.user_id).await.unwrap());
        assert_eq!(f.service.remaining_backup_codes(&f.user_id).await.unwrap(), 10);

        // Stored codes are digests
        let stored = f.repository.get(&f.user_id, TwoFactorKind::Backup).unwrap();
        assert!(stored.backup_codes.iter().all(|c| !backup.contains(&c.code_hash)));
    }

    #[tokio::test]
    async fn test_activate_with_wrong_code() {
        let f = fixture();
        f.service.enroll_totp(&f.user_id, "a@x.com").await.unwrap();

        let result = f.service.activate_totp(&f.user_id, "000000").await;
        assert!(matches!(result, Err(Error::Auth(AuthError::TwoFactorInvalid))));
        assert!(!f.service.has_active_two_factor(&f.user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_enroll_twice_when_active_is_rejected() {
        let f = fixture();
        f.activated_totp().await;
        let result = f.service.enroll_totp(&f.user_id, "a@x.com").await;
        assert!(matches!(
            result,
            Err(Error::Auth(AuthError::TwoFactorAlreadyEnabled))
        ));
    }

    #[tokio::test]
    async fn test_verify_totp_rejects_replay() {
        let f = fixture();
        let (secret, _) = f.activated_totp().await;

        let code = f.current_code(&secret);
        assert!(f.service.verify_totp(&f.user_id, &code).await.unwrap());
        assert!(!f.service.verify_totp(&f.user_id, &code).await.unwrap());

        f.clock.advance(Duration::seconds(30));
        let code = f.current_code(&secret);
        assert!(f.service.verify_totp(&f.user_id, &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_totp_lockout_after_five_failures() {
        let f = fixture();
        let (secret, _) = f.activated_totp().await;
        let wrong = {
            let code = f.current_code(&secret);
            if code == "123456" { "654321" } else { "123456" }
        };

        for _ in 0..5 {
            assert!(!f.service.verify_totp(&f.user_id, wrong).await.unwrap());
        }

        // Locked: even the right code fails fast
        let code = f.current_code(&secret);
        let result = f.service.verify_totp(&f.user_id, &code).await;
        let Err(Error::Auth(AuthError::TwoFactorLocked { until })) = result else {
            panic!("expected lock, got {result:?}");
        };
        assert_eq!(until, f.clock.now() + Duration::minutes(30));

        // After the lock expires verification proceeds and success clears the counter
        f.clock.advance(Duration::minutes(30));
        let code = f.current_code(&secret);
        assert!(f.service.verify_totp(&f.user_id, &code).await.unwrap());
        let method = f.repository.get(&f.user_id, TwoFactorKind::Totp).unwrap();
        assert_eq!(method.failed_attempts, 0);
        assert_eq!(method.locked_until, None);
    }

    #[tokio::test]
    async fn test_backup_codes_single_use() {
        let f = fixture();
        let (_, backup) = f.activated_totp().await;

        for (used, code) in backup.iter().enumerate() {
            assert!(f.service.verify_backup_code(&f.user_id, code).await.unwrap());
            assert_eq!(
                f.service.remaining_backup_codes(&f.user_id).await.unwrap(),
                10 - used - 1
            );
        }
        // Reuse fails
        assert!(!f.service.verify_backup_code(&f.user_id, &backup[0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_backup_code_input_is_normalized() {
        let f = fixture();
        let (_, backup) = f.activated_totp().await;
        let sloppy = backup[0].to_lowercase().replace('-', " ");
        assert!(f.service.verify_backup_code(&f.user_id, &sloppy).await.unwrap());
    }

    #[tokio::test]
    async fn test_regenerate_backup_codes() {
        let f = fixture();
        let (_, old) = f.activated_totp().await;

        let new = f.service.regenerate_backup_codes(&f.user_id).await.unwrap();
        assert_eq!(new.len(), 10);
        assert!(!f.service.verify_backup_code(&f.user_id, &old[0]).await.unwrap());
        assert!(f.service.verify_backup_code(&f.user_id, &new[0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_regenerate_requires_totp() {
        let f = fixture();
        let result = f.service.regenerate_backup_codes(&f.user_id).await;
        assert!(matches!(result, Err(Error::Auth(AuthError::TwoFactorNotEnabled))));
    }

    #[tokio::test]
    async fn test_email_enrollment_and_verification() {
        let f = fixture();
        let expires_at = f
            .service
            .enroll_email(&f.user_id, "A@X.com")
            .await
            .unwrap();
        assert_eq!(expires_at, f.clock.now() + Duration::minutes(10));
        assert!(!f.service.has_active_two_factor(&f.user_id).await.unwrap());

        let (destination, code) = f.sender.sent.lock().unwrap()[0].clone();
        assert_eq!(destination, "a@x.com");
        assert_eq!(code.len(), 6);

        assert!(f.service.verify_email_code(&f.user_id, &code).await.unwrap());
        assert!(f.service.has_active_two_factor(&f.user_id).await.unwrap());

        // Consumed
        assert!(!f.service.verify_email_code(&f.user_id, &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_ignores_pending_email_enrollment() {
        let f = fixture();
        f.service.enroll_email(&f.user_id, "a@x.com").await.unwrap();
        let code = f.sender.last_code();

        let result = f.service.verify(&f.user_id, TwoFactorKind::Email, &code).await;
        assert!(matches!(result, Err(Error::Auth(AuthError::TwoFactorNotEnabled))));

        // Still pending, and the code is still good for activation
        assert!(!f.service.has_active_two_factor(&f.user_id).await.unwrap());
        assert!(f.service.verify_email_code(&f.user_id, &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_email_code_expires() {
        let f = fixture();
        f.service.enroll_email(&f.user_id, "a@x.com").await.unwrap();
        let code = f.sender.last_code();

        f.clock.advance(Duration::minutes(10));
        assert!(!f.service.verify_email_code(&f.user_id, &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_email_resend_replaces_pending_code() {
        let f = fixture();
        f.service.enroll_email(&f.user_id, "a@x.com").await.unwrap();
        let first = f.sender.last_code();
        f.service.send_email_code(&f.user_id).await.unwrap();
        let second = f.sender.last_code();

        if first != second {
            assert!(!f.service.verify_email_code(&f.user_id, &first).await.unwrap());
        }
        assert!(f.service.verify_email_code(&f.user_id, &second).await.unwrap());
    }

    #[tokio::test]
    async fn test_send_failure_is_not_fatal() {
        let f = fixture_with(CapturingSender {
            fail: true,
            ..Default::default()
        });
        assert!(f.service.enroll_email(&f.user_id, "a@x.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_disable_totp_disables_backup_codes() {
        let f = fixture();
        let (_, backup) = f.activated_totp().await;

        f.service
            .disable(&f.user_id, TwoFactorKind::Totp)
            .await
            .unwrap();
        assert!(!f.service.has_active_two_factor(&f.user_id).await.unwrap());
        assert_eq!(f.service.remaining_backup_codes(&f.user_id).await.unwrap(), 0);
        assert!(matches!(
            f.service.verify_backup_code(&f.user_id, &backup[0]).await,
            Err(Error::Auth(AuthError::TwoFactorNotEnabled))
        ));

        // Re-enrollment is allowed after disabling
        assert!(f.service.enroll_totp(&f.user_id, "a@x.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_without_method() {
        let f = fixture();
        for kind in [TwoFactorKind::Totp, TwoFactorKind::Email, TwoFactorKind::Backup] {
            assert!(matches!(
                f.service.verify(&f.user_id, kind, "123456").await,
                Err(Error::Auth(AuthError::TwoFactorNotEnabled))
            ));
        }
    }
}
