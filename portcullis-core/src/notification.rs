//! Outbound delivery of one-time codes
//!
//! Rendering and transport are the host application's concern; the engine only
//! asks for "send code X to identity Y".
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::NotificationError;

#[async_trait]
pub trait NotificationSender: Send + Sync + 'static {
    /// Deliver a second-factor code to `destination`
    async fn send_two_factor_code(
        &self,
        destination: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), NotificationError>;
}

#[async_trait]
impl NotificationSender for Box<dyn NotificationSender> {
    async fn send_two_factor_code(
        &self,
        destination: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        (**self)
            .send_two_factor_code(destination, code, expires_at)
            .await
    }
}

/// Sender used when the host has not configured one. Every send fails, which
/// callers log and otherwise ignore.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredNotificationSender;

#[async_trait]
impl NotificationSender for UnconfiguredNotificationSender {
    async fn send_two_factor_code(
        &self,
        _destination: &str,
        _code: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        Err(NotificationError::Delivery(
            "no notification sender configured".to_string(),
        ))
    }
}
