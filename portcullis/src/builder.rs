//! Builder pattern for constructing Portcullis instances
//!
//! The builder is type-state: storage must be chosen before [`build`] exists,
//! so a misconfigured instance cannot be constructed.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use portcullis::{JwtConfig, PortcullisBuilder, PortcullisConfig, SystemClock};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), portcullis::Error> {
//!     let config = PortcullisConfig::new(JwtConfig::new_hs256(
//!         b"replace-me-with-32-bytes-of-secret".to_vec(),
//!     ));
//!
//!     let portcullis = PortcullisBuilder::new(config)
//!         .with_memory_storage()
//!         .with_clock(Arc::new(SystemClock))
//!         .build()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! [`build`]: PortcullisBuilder::build

use std::sync::Arc;

use portcullis_core::{
    Error, EventBus, EventHandler, NotificationSender, RevocationService, RevocationStore,
    TwoFactorRepository, UserDirectory,
    clock::{Clock, SystemClock},
    notification::UnconfiguredNotificationSender,
    revocation::MemoryRevocationStore,
    services::{CredentialVerifier, LockoutService, PasswordService, TwoFactorService},
    token::TokenService,
};
use portcullis_storage_memory::{MemoryTwoFactorRepository, MemoryUserDirectory};

use crate::{Portcullis, PortcullisConfig};

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`PortcullisBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
///
/// Storage is opened at build time with the final clock.
pub struct WithStorage<U: UserDirectory, R: TwoFactorRepository> {
    open: Box<dyn FnOnce(&Arc<dyn Clock>) -> (Arc<U>, Arc<R>) + Send>,
}

/// Collaborators that can be set in any state
struct Collaborators {
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSender>,
    revocation_store: Option<Arc<dyn RevocationStore>>,
    handlers: Vec<Arc<dyn EventHandler>>,
    #[cfg(feature = "redis")]
    redis: Option<portcullis_redis::RedisRevocationStore>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            notifier: Arc::new(UnconfiguredNotificationSender),
            revocation_store: None,
            handlers: Vec::new(),
            #[cfg(feature = "redis")]
            redis: None,
        }
    }
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`Portcullis`] instances.
///
/// # Type States
///
/// - [`NoStorage`]: Initial state, storage must be configured
/// - [`WithStorage<U, R>`]: Storage configured, ready to build
///
/// # Defaults
///
/// - Clock: [`SystemClock`]
/// - Revocation: process-local [`MemoryRevocationStore`]
/// - Notifications: none; email codes are stored but delivery fails and is logged
pub struct PortcullisBuilder<Storage> {
    storage: Storage,
    config: PortcullisConfig,
    collaborators: Collaborators,
}

impl PortcullisBuilder<NoStorage> {
    pub fn new(config: PortcullisConfig) -> Self {
        Self {
            storage: NoStorage,
            config,
            collaborators: Collaborators::default(),
        }
    }

    /// Use the given user directory and second-factor repository.
    pub fn with_storage<U: UserDirectory, R: TwoFactorRepository>(
        self,
        users: Arc<U>,
        two_factor: Arc<R>,
    ) -> PortcullisBuilder<WithStorage<U, R>> {
        self.with_storage_opener(move |_| (users, two_factor))
    }

    /// Use fresh in-process storage, stamped by the builder's clock.
    pub fn with_memory_storage(
        self,
    ) -> PortcullisBuilder<WithStorage<MemoryUserDirectory, MemoryTwoFactorRepository>> {
        self.with_storage_opener(|clock| {
            (
                Arc::new(MemoryUserDirectory::with_clock(clock.clone())),
                Arc::new(MemoryTwoFactorRepository::with_clock(clock.clone())),
            )
        })
    }

    fn with_storage_opener<U: UserDirectory, R: TwoFactorRepository>(
        self,
        open: impl FnOnce(&Arc<dyn Clock>) -> (Arc<U>, Arc<R>) + Send + 'static,
    ) -> PortcullisBuilder<WithStorage<U, R>> {
        PortcullisBuilder {
            storage: WithStorage {
                open: Box::new(open),
            },
            config: self.config,
            collaborators: self.collaborators,
        }
    }
}

// ============================================================================
// Configuration Methods (available in all states)
// ============================================================================

impl<S> PortcullisBuilder<S> {
    /// Time source for every expiry, lock and TOTP step computation.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.collaborators.clock = clock;
        self
    }

    /// Delivery channel for email one-time codes.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSender>) -> Self {
        self.collaborators.notifier = notifier;
        self
    }

    /// Replace the revocation store entirely.
    ///
    /// Takes precedence over any store configured with `with_redis_revocation`.
    pub fn with_revocation_store(mut self, store: Arc<dyn RevocationStore>) -> Self {
        self.collaborators.revocation_store = Some(store);
        self
    }

    /// Connect to Redis for revocations shared across instances.
    ///
    /// Revocations fall back to a process-local store while Redis is
    /// unreachable.
    #[cfg(feature = "redis")]
    pub async fn with_redis_revocation(
        mut self,
        config: portcullis_redis::RedisRevocationConfig,
    ) -> Result<Self, Error> {
        let store = portcullis_redis::RedisRevocationStore::connect(config).await?;
        self.collaborators.redis = Some(store);
        Ok(self)
    }

    /// Register an audit event handler before the instance is built.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.collaborators.handlers.push(handler);
        self
    }
}

impl Collaborators {
    fn revocation_store(&mut self) -> Arc<dyn RevocationStore> {
        if let Some(store) = self.revocation_store.take() {
            return store;
        }

        let local = MemoryRevocationStore::new(self.clock.clone());

        #[cfg(feature = "redis")]
        {
            if let Some(redis) = self.redis.take() {
                return Arc::new(portcullis_core::revocation::FallbackRevocationStore::new(
                    redis, local,
                ));
            }
        }

        Arc::new(local)
    }
}

impl<U: UserDirectory, R: TwoFactorRepository> PortcullisBuilder<WithStorage<U, R>> {
    /// Build the Portcullis instance.
    ///
    /// Fails only when the JWT key material cannot be parsed.
    pub async fn build(self) -> Result<Portcullis<U, R>, Error> {
        let PortcullisBuilder {
            storage: WithStorage { open },
            config,
            mut collaborators,
        } = self;
        let clock = collaborators.clock.clone();
        let (users, two_factor) = open(&clock);
        let events = EventBus::new();

        for handler in collaborators.handlers.drain(..) {
            events.register(handler).await;
        }

        let tokens = Arc::new(TokenService::new(config.jwt, config.tokens, clock.clone())?);
        let revocation = Arc::new(RevocationService::new(
            collaborators.revocation_store(),
            clock.clone(),
        ));
        let credentials = Arc::new(CredentialVerifier::new(
            users.clone(),
            PasswordService::new(config.password),
        ));
        let lockout = Arc::new(LockoutService::new(
            users.clone(),
            config.lockout,
            events.clone(),
            clock.clone(),
        ));
        let two_factor = Arc::new(TwoFactorService::new(
            two_factor,
            collaborators.notifier.clone(),
            config.two_factor,
            events.clone(),
            clock.clone(),
        ));

        tracing::debug!("Portcullis instance built");

        Ok(Portcullis::new(
            users,
            credentials,
            lockout,
            two_factor,
            tokens,
            revocation,
            events,
            clock,
        ))
    }
}
