use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{UserId, error::EventError, token::TokenType, two_factor::TwoFactorKind};

/// Reason why an account was unlocked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnlockReason {
    /// A correct login reset the counters
    SuccessfulLogin,
    /// Administrator manually unblocked the account
    AdminAction,
}

/// Security-relevant transitions emitted by the engine.
///
/// Events are the audit trail of the system: every lock, unlock, revocation and
/// repeated second-factor failure is published here so an external logging
/// collaborator can persist or alert on it.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Emitted when a password check fails for an existing account.
    LoginFailed {
        user_id: UserId,
        /// Consecutive failures including this one
        failed_attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an account crosses the failed-login threshold.
    ///
    /// This is a security-critical event that should trigger alerts.
    AccountLocked {
        user_id: UserId,
        failed_attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a locked or partially-failed account is reset.
    AccountUnlocked {
        user_id: UserId,
        reason: UnlockReason,
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a token is added to the revocation set.
    TokenRevoked {
        user_id: UserId,
        token_type: TokenType,
        expires_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    TwoFactorEnabled {
        user_id: UserId,
        kind: TwoFactorKind,
        timestamp: DateTime<Utc>,
    },

    TwoFactorDisabled {
        user_id: UserId,
        kind: TwoFactorKind,
        timestamp: DateTime<Utc>,
    },

    TwoFactorFailed {
        user_id: UserId,
        kind: TwoFactorKind,
        failed_attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a second-factor method is locked after repeated failures.
    TwoFactorLocked {
        user_id: UserId,
        kind: TwoFactorKind,
        locked_until: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    BackupCodeUsed {
        user_id: UserId,
        remaining: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A trait for handling events emitted by the event bus
///
/// Implementors of this trait can be registered with the [`EventBus`] to receive and process events.
///
/// # Examples
///
/// ```
/// # use portcullis_core::events::{Event, EventHandler};
/// # use portcullis_core::error::EventError;
/// # use async_trait::async_trait;
/// struct AuditLog;
///
/// #[async_trait]
/// impl EventHandler for AuditLog {
///     async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
///         println!("{event:?}");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Event bus that can emit events and register event handlers
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register an event handler with the event bus
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers, stopping at the first failure
    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }

    /// Emit an event to every handler; failures are logged and swallowed.
    ///
    /// Auditing never fails the operation that produced the event.
    pub async fn publish(&self, event: Event) {
        for handler in self.handlers.read().await.iter() {
            if let Err(e) = handler.handle_event(&event).await {
                tracing::warn!(error = %e, event = ?event, "Event handler failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingHandler {
        events: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct ErroringEventHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for ErroringEventHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EventError::HandlerError("sink unavailable".into()))
        }
    }

    fn locked_event() -> Event {
        Event::AccountLocked {
            user_id: UserId::new("usr_test"),
            failed_attempts: 5,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_empty() {
        let event_bus = EventBus::default();
        event_bus
            .emit(&locked_event())
            .await
            .expect("Failed to emit event");
    }

    #[tokio::test]
    async fn test_event_bus_multiple_handlers() {
        let event_bus = EventBus::default();
        let first = Arc::new(RecordingHandler::default());
        let second = Arc::new(RecordingHandler::default());
        event_bus.register(first.clone()).await;
        event_bus.register(second.clone()).await;

        let event = locked_event();
        event_bus.emit(&event).await.unwrap();

        assert_eq!(first.events.lock().unwrap().as_slice(), &[event.clone()]);
        assert_eq!(second.events.lock().unwrap().as_slice(), &[event]);
    }

    #[tokio::test]
    async fn test_emit_propagates_handler_error() {
        let event_bus = EventBus::default();
        event_bus
            .register(Arc::new(ErroringEventHandler {
                calls: AtomicUsize::new(0),
            }))
            .await;

        let result = event_bus.emit(&locked_event()).await;
        assert!(matches!(result, Err(EventError::HandlerError(_))));
    }

    #[tokio::test]
    async fn test_publish_continues_past_failing_handler() {
        let event_bus = EventBus::default();
        let failing = Arc::new(ErroringEventHandler {
            calls: AtomicUsize::new(0),
        });
        let recording = Arc::new(RecordingHandler::default());
        event_bus.register(failing.clone()).await;
        event_bus.register(recording.clone()).await;

        event_bus.publish(locked_event()).await;

        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(recording.events.lock().unwrap().len(), 1);
    }
}
