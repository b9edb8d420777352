#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use portcullis::{
    AuthenticatedSession, Clock, Event, EventHandler, JwtConfig, LoginOutcome, ManualClock,
    MemoryPortcullis, NotificationSender, PortcullisBuilder, PortcullisConfig, UserId, UserRecord,
    error::{EventError, NotificationError},
};

pub const PASSWORD: &str = "Secret123";

#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Captures every code instead of delivering it
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
}

impl Outbox {
    pub fn last_code(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, code)| code.clone())
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSender for Outbox {
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
        Ok(())
    }
}

pub struct Harness {
    pub portcullis: Arc<MemoryPortcullis>,
    pub clock: ManualClock,
    pub audit: Arc<RecordingHandler>,
    pub outbox: Arc<Outbox>,
}

pub async fn harness() -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
    let audit = Arc::new(RecordingHandler::default());
    let outbox = Arc::new(Outbox::default());

    let config = PortcullisConfig::new(JwtConfig::new_hs256(
        b"integration-test-secret-integration-test".to_vec(),
    ));
    let portcullis = PortcullisBuilder::new(config)
        .with_memory_storage()
        .with_clock(Arc::new(clock.clone()))
        .with_notifier(outbox.clone())
        .with_event_handler(audit.clone())
        .build()
        .await
        .unwrap();

    Harness {
        portcullis: Arc::new(portcullis),
        clock,
        audit,
        outbox,
    }
}

impl Harness {
    /// Insert an active account. bcrypt runs at its minimum cost to keep tests fast.
    pub fn add_user(&self, email: &str, password: &str) -> UserId {
        let record = UserRecord::builder()
            .email(email)
            .password_hash(bcrypt::hash(password, 4).unwrap())
            .build()
            .unwrap();
        let id = record.id.clone();
        self.portcullis.users().insert(record).unwrap();
        id
    }

    pub async fn login_ok(&self, email: &str, password: &str) -> AuthenticatedSession {
        match self.portcullis.authenticate(email, password).await.unwrap() {
            LoginOutcome::Authenticated(session) => session,
            other => panic!("expected authenticated, got {other:?}"),
        }
    }

    /// The TOTP code for `secret` at the current clock time
    pub fn totp_code(&self, secret: &str) -> String {
        self.portcullis
            .two_factor()
            .totp()
            .code_at(secret, self.clock.now())
            .unwrap()
    }

    /// Enroll and activate TOTP, returning the secret and the backup codes
    pub async fn enable_totp(&self, user_id: &UserId, email: &str) -> (String, Vec<String>) {
        let enrollment = self.portcullis.enroll_totp(user_id, email).await.unwrap();
        let code = self.totp_code(&enrollment.secret);
        let backup_codes = self
            .portcullis
            .activate_totp(user_id, &code)
            .await
            .unwrap();
        (enrollment.secret, backup_codes)
    }
}
