//! In-memory availability cache with per-entry TTL.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use stockroom_core::{CacheError, HealthCheck, StockroomError, StockroomResult, TenantId};

use super::tenant_key::TenantScopedKey;
use super::traits::{AvailabilityCache, CacheStats};

#[derive(Debug, Clone, Copy)]
struct Entry {
    available: i64,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<TenantScopedKey, Entry>,
    stats: CacheStats,
}

/// `RwLock<HashMap>` cache. Expired entries are dropped when read or swept.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAvailabilityCache {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryAvailabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> StockroomResult<usize> {
        let now = Instant::now();
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.entries.values().filter(|e| e.is_live(now)).count())
    }

    pub fn is_empty(&self) -> StockroomResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl AvailabilityCache for InMemoryAvailabilityCache {
    async fn get(&self, key: &TenantScopedKey) -> StockroomResult<Option<i64>> {
        let now = Instant::now();
        let mut inner = self.inner.write().map_err(|_| poisoned())?;

        match inner.entries.get(key).copied() {
            Some(entry) if entry.is_live(now) => {
                inner.stats.hits += 1;
                Ok(Some(entry.available))
            }
            Some(_) => {
                inner.entries.remove(key);
                inner.stats.expirations += 1;
                inner.stats.misses += 1;
                inner.stats.entry_count = inner.entries.len() as u64;
                Ok(None)
            }
            None => {
                inner.stats.misses += 1;
                Ok(None)
            }
        }
    }

    async fn set(
        &self,
        key: &TenantScopedKey,
        available: i64,
        ttl: Duration,
    ) -> StockroomResult<()> {
        let expires_at = Instant::now().checked_add(ttl).ok_or_else(|| {
            StockroomError::Cache(CacheError::Backend {
                reason: format!("ttl {:?} is out of range", ttl),
            })
        })?;
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        inner.entries.insert(
            *key,
            Entry {
                available,
                expires_at,
            },
        );
        inner.stats.entry_count = inner.entries.len() as u64;
        Ok(())
    }

    async fn delete(&self, key: &TenantScopedKey) -> StockroomResult<bool> {
        let now = Instant::now();
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let removed = inner.entries.remove(key);
        inner.stats.entry_count = inner.entries.len() as u64;
        Ok(removed.is_some_and(|e| e.is_live(now)))
    }

    async fn keys_for_tenant(&self, tenant_id: TenantId) -> StockroomResult<Vec<TenantScopedKey>> {
        let now = Instant::now();
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner
            .entries
            .iter()
            .filter(|(key, entry)| key.tenant_id() == tenant_id && entry.is_live(now))
            .map(|(key, _)| *key)
            .collect())
    }

    async fn sweep_expired(&self, tenant_id: TenantId) -> StockroomResult<u64> {
        let now = Instant::now();
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let before = inner.entries.len();
        inner
            .entries
            .retain(|key, entry| key.tenant_id() != tenant_id || entry.is_live(now));

        let removed = (before - inner.entries.len()) as u64;
        inner.stats.expirations += removed;
        inner.stats.entry_count = inner.entries.len() as u64;
        Ok(removed)
    }

    async fn stats(&self) -> StockroomResult<CacheStats> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.stats.clone())
    }

    async fn health_check(&self) -> StockroomResult<HealthCheck> {
        match self.inner.read() {
            Ok(inner) => Ok(HealthCheck::healthy("availability_cache")
                .with_metadata("entries", serde_json::json!(inner.entries.len()))
                .with_metadata("hit_rate", serde_json::json!(inner.stats.hit_rate()))),
            Err(_) => Ok(HealthCheck::unhealthy("availability_cache", "lock poisoned")),
        }
    }
}

fn poisoned() -> StockroomError {
    StockroomError::Cache(CacheError::Backend {
        reason: "cache lock poisoned".to_string(),
    })
}
