//! Availability cache contract.
//!
//! The cache maps a [`TenantScopedKey`] to the last known available quantity
//! of that product. It is never authoritative: every value can be rebuilt
//! from the durable store.

use std::time::Duration;

use async_trait::async_trait;
use stockroom_core::{HealthCheck, StockroomResult, TenantId};

use super::tenant_key::TenantScopedKey;

/// Cache backend trait for pluggable availability caches.
///
/// Implementations should be thread-safe and support concurrent access.
/// Expired entries must behave exactly like missing ones.
#[async_trait]
pub trait AvailabilityCache: Send + Sync {
    /// Look up the cached available quantity. `None` on a miss.
    async fn get(&self, key: &TenantScopedKey) -> StockroomResult<Option<i64>>;

    /// Store an available quantity, replacing any existing entry.
    async fn set(&self, key: &TenantScopedKey, available: i64, ttl: Duration)
        -> StockroomResult<()>;

    /// Remove an entry. Returns whether a live entry existed.
    async fn delete(&self, key: &TenantScopedKey) -> StockroomResult<bool>;

    /// Every live key under the tenant's namespace.
    async fn keys_for_tenant(&self, tenant_id: TenantId) -> StockroomResult<Vec<TenantScopedKey>>;

    /// Reclaim every expired entry of a tenant. Returns how many were removed.
    ///
    /// Expired entries are otherwise only dropped when their own key is read,
    /// so entries of deleted or cold products need this to be reclaimed.
    async fn sweep_expired(&self, tenant_id: TenantId) -> StockroomResult<u64>;

    /// Get cache statistics.
    async fn stats(&self) -> StockroomResult<CacheStats>;

    async fn health_check(&self) -> StockroomResult<HealthCheck>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, expired entries included.
    pub misses: u64,
    /// Number of entries currently stored, possibly including expired ones
    /// not yet reclaimed.
    pub entry_count: u64,
    /// Number of entries dropped because their TTL elapsed.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
