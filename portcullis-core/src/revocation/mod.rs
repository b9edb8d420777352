//! Token revocation
//!
//! A revoked token is remembered until its natural expiry, after which the
//! signature check alone rejects it. Stores only ever see the SHA-256 digest of
//! a token, never the token itself.
//!
//! Two stores ship with the core:
//!
//! - [`MemoryRevocationStore`] keeps entries in process memory. Its guarantee
//!   is per-process only.
//! - [`FallbackRevocationStore`] layers a primary (distributed) store over a
//!   local one, degrading to the local store while the primary is unreachable.
pub mod fallback;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::{Error, clock::Clock, crypto::hash_token};

pub use fallback::FallbackRevocationStore;
pub use memory::MemoryRevocationStore;

/// A set of keys that expire on their own.
#[async_trait]
pub trait RevocationStore: Send + Sync + 'static {
    /// Record `key` for `ttl`.
    ///
    /// Returns `true` if the key was not already live. Re-adding a live key
    /// must never shorten its lifetime. The check and the write are one atomic
    /// step, so of concurrent adds of the same key exactly one returns `true`.
    async fn add(&self, key: &str, ttl: Duration) -> Result<bool, Error>;

    /// True while `key` is recorded and its TTL has not elapsed.
    async fn contains(&self, key: &str) -> Result<bool, Error>;
}

#[async_trait]
impl<T: RevocationStore + ?Sized> RevocationStore for Arc<T> {
    async fn add(&self, key: &str, ttl: Duration) -> Result<bool, Error> {
        (**self).add(key, ttl).await
    }

    async fn contains(&self, key: &str) -> Result<bool, Error> {
        (**self).contains(key).await
    }
}

#[async_trait]
impl RevocationStore for Box<dyn RevocationStore> {
    async fn add(&self, key: &str, ttl: Duration) -> Result<bool, Error> {
        (**self).add(key, ttl).await
    }

    async fn contains(&self, key: &str) -> Result<bool, Error> {
        (**self).contains(key).await
    }
}

/// Revokes raw tokens against a [`RevocationStore`].
pub struct RevocationService {
    store: Arc<dyn RevocationStore>,
    clock: Arc<dyn Clock>,
}

impl RevocationService {
    pub fn new(store: Arc<dyn RevocationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Revoke `token` until `expires_at`.
    ///
    /// Returns `true` if this call revoked the token, `false` if it was
    /// already revoked or is past its natural expiry (the store is not touched).
    pub async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<bool, Error> {
        let ttl = expires_at - self.clock.now();
        if ttl <= Duration::zero() {
            return Ok(false);
        }

        self.store.add(&hash_token(token), ttl).await
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool, Error> {
        self.store.contains(&hash_token(token)).await
    }
}
