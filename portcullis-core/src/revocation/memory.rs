use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

use crate::{Error, clock::Clock};

use super::RevocationStore;

/// Process-local revocation set.
///
/// Expiry is evaluated lazily on read, so correctness never depends on a
/// background timer. [`purge_expired`](Self::purge_expired) reclaims memory and
/// may be called from any periodic task the host already runs.
pub struct MemoryRevocationStore {
    entries: DashMap<String, DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl MemoryRevocationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Drop every entry whose TTL has elapsed, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn add(&self, key: &str, ttl: Duration) -> Result<bool, Error> {
        if ttl <= Duration::zero() {
            return Ok(false);
        }

        let now = self.clock.now();
        let expires_at = now + ttl;
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) if *entry.get() > now => {
                if expires_at > *entry.get() {
                    entry.insert(expires_at);
                }
                Ok(false)
            }
            Entry::Occupied(mut entry) => {
                entry.insert(expires_at);
                Ok(true)
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn contains(&self, key: &str) -> Result<bool, Error> {
        let now = self.clock.now();
        let live = match self.entries.get(key) {
            Some(expires_at) => *expires_at > now,
            None => return Ok(false),
        };

        if !live {
            self.entries.remove_if(key, |_, expires_at| *expires_at <= now);
        }
        Ok(live)
    }
}
