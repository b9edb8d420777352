use async_trait::async_trait;
use chrono::Duration;

use crate::Error;

use super::RevocationStore;

/// A primary store backed by a local one.
///
/// Writes go to the primary; if it fails they land in the local store instead,
/// which only protects the current process. Reads consult both, and a failing
/// primary degrades to the local answer rather than failing the request.
pub struct FallbackRevocationStore<P, L> {
    primary: P,
    local: L,
}

impl<P: RevocationStore, L: RevocationStore> FallbackRevocationStore<P, L> {
    pub fn new(primary: P, local: L) -> Self {
        Self { primary, local }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn local(&self) -> &L {
        &self.local
    }
}

#[async_trait]
impl<P: RevocationStore, L: RevocationStore> RevocationStore for FallbackRevocationStore<P, L> {
    async fn add(&self, key: &str, ttl: Duration) -> Result<bool, Error> {
        match self.primary.add(key, ttl).await {
            Ok(added) => Ok(added),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Primary revocation store unavailable, revocation is local to this process"
                );
                self.local.add(key, ttl).await
            }
        }
    }

    async fn contains(&self, key: &str) -> Result<bool, Error> {
        match self.primary.contains(key).await {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Primary revocation store unavailable, checking local store only"
                );
            }
        }

        self.local.contains(key).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{clock::ManualClock, error::StorageError, revocation::MemoryRevocationStore};

    /// Wraps a memory store and fails every call while `down` is set.
    struct FlakyStore {
        inner: MemoryRevocationStore,
        down: AtomicBool,
    }

    #[async_trait]
    impl RevocationStore for FlakyStore {
        async fn add(&self, key: &str, ttl: Duration) -> Result<bool, Error> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("connection refused".into()).into());
            }
            self.inner.add(key, ttl).await
        }

        async fn contains(&self, key: &str) -> Result<bool, Error> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("connection refused".into()).into());
            }
            self.inner.contains(key).await
        }
    }

    fn setup() -> FallbackRevocationStore<Arc<FlakyStore>, Arc<MemoryRevocationStore>> {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ));
        let primary = Arc::new(FlakyStore {
            inner: MemoryRevocationStore::new(clock.clone()),
            down: AtomicBool::new(false),
        });
        let local = Arc::new(MemoryRevocationStore::new(clock));
        FallbackRevocationStore::new(primary, local)
    }

    #[tokio::test]
    async fn test_writes_go_to_primary_when_healthy() {
        let store = setup();
        store.add("k", Duration::minutes(1)).await.unwrap();

        assert!(store.primary().inner.contains("k").await.unwrap());
        assert!(store.local().is_empty());
        assert!(store.contains("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_writes_fall_back_to_local_during_outage() {
        let store = setup();
        store.primary().down.store(true, Ordering::SeqCst);

        store.add("k", Duration::minutes(1)).await.unwrap();
        assert_eq!(store.local().len(), 1);
        assert!(store.contains("k").await.unwrap());

        // Still revoked once the primary recovers
        store.primary().down.store(false, Ordering::SeqCst);
        assert!(store.contains("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_primary_entries_unreadable_during_outage() {
        let store = setup();
        store.add("k", Duration::minutes(1)).await.unwrap();

        store.primary().down.store(true, Ordering::SeqCst);
        assert!(!store.contains("k").await.unwrap());
    }
}
