use async_trait::async_trait;
use dashmap::DashMap;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time::Instant;

use crate::services::cache::client::{CacheClient, CacheResult};

/// Minimum gap between two full sweeps of expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process TTL cache, used when no Valkey URL is configured.
///
/// Expired entries are evicted on read, and writes sweep the whole map at most once per
/// [`SWEEP_INTERVAL`], so keys that are never read again do not accumulate.
/// Uses the tokio clock so paused-time tests apply.
#[derive(Clone, Debug)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, Entry>>,
    last_sweep: Arc<Mutex<Instant>>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            last_sweep: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sweep_if_due(&self, now: Instant) {
        // another writer is already sweeping
        let Ok(mut last) = self.last_sweep.try_lock() else {
            return;
        };
        if now.duration_since(*last) < SWEEP_INTERVAL {
            return;
        }
        *last = now;
        drop(last);

        let before = self.len();
        self.entries.retain(|_, e| e.expires_at > now);
        tracing::debug!(
            removed = before.saturating_sub(self.len()),
            remaining = self.len(),
            "swept expired identity cache entries"
        );
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();

        // the shard guard must be released before `remove_if`
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, e| e.expires_at <= now);
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        self.sweep_if_due(now);

        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        Ok(u64::from(self.entries.remove(key).is_some()))
    }
}
