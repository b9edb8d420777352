//! Redis-backed token revocation
//!
//! [`RedisRevocationStore`] shares revoked-token digests across every process
//! that points at the same Redis. Each entry is a plain key with a TTL equal to
//! the remaining lifetime of the token, so Redis evicts it on its own once the
//! token would have expired anyway.
//!
//! Wrap it in [`portcullis_core::revocation::FallbackRevocationStore`] to keep
//! revoking locally while Redis is unreachable:
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), portcullis_core::Error> {
//! use portcullis_core::clock::SystemClock;
//! use portcullis_core::revocation::{FallbackRevocationStore, MemoryRevocationStore};
//! use portcullis_redis::{RedisRevocationConfig, RedisRevocationStore};
//! use std::sync::Arc;
//!
//! let redis = RedisRevocationStore::connect(RedisRevocationConfig::from_env()).await?;
//! let local = MemoryRevocationStore::new(Arc::new(SystemClock));
//! let store = FallbackRevocationStore::new(redis, local);
//! # Ok(())
//! # }
//! ```
use async_trait::async_trait;
use chrono::Duration;
use portcullis_core::{Error, RevocationStore, error::utilities::StorageResultExt};
use redis::{AsyncCommands, Client, aio::ConnectionManager};

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_KEY_PREFIX: &str = "portcullis:revoked:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisRevocationConfig {
    pub url: String,
    /// Prepended to every token digest
    pub key_prefix: String,
}

impl Default for RedisRevocationConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl RedisRevocationConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    /// Read `PORTCULLIS_REDIS_URL` and `PORTCULLIS_REDIS_KEY_PREFIX`, falling
    /// back to the defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("PORTCULLIS_REDIS_URL").unwrap_or(defaults.url),
            key_prefix: std::env::var("PORTCULLIS_REDIS_KEY_PREFIX")
                .unwrap_or(defaults.key_prefix),
        }
    }
}

/// Revocation store backed by a Redis [`ConnectionManager`].
///
/// The manager reconnects on its own; a command issued while Redis is down
/// fails with [`portcullis_core::error::StorageError::Connection`].
#[derive(Clone)]
pub struct RedisRevocationStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisRevocationStore {
    pub fn new(connection: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        Self {
            connection,
            key_prefix: key_prefix.into(),
        }
    }

    pub async fn connect(config: RedisRevocationConfig) -> Result<Self, Error> {
        let client = Client::open(config.url.as_str()).map_connection_err()?;
        let connection = ConnectionManager::new(client).await.map_connection_err()?;
        tracing::info!(key_prefix = %config.key_prefix, "Connected to Redis revocation store");
        Ok(Self::new(connection, config.key_prefix))
    }

    fn key(&self, digest: &str) -> String {
        format!("{}{digest}", self.key_prefix)
    }
}

/// Whole seconds for `EX`, rounded up so the entry lives at least as long as the token.
fn ttl_secs(ttl: Duration) -> u64 {
    let millis = ttl.num_milliseconds().max(1) as u64;
    millis.div_ceil(1000)
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn add(&self, key: &str, ttl: Duration) -> Result<bool, Error> {
        let mut connection = self.connection.clone();
        // SET NX replies OK when it wrote the key and nil when the key was live
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(key))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut connection)
            .await
            .map_connection_err()?;
        Ok(reply.is_some())
    }

    async fn contains(&self, key: &str) -> Result<bool, Error> {
        let mut connection = self.connection.clone();
        connection
            .exists(self.key(key))
            .await
            .map_connection_err()
    }
}
