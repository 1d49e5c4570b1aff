//! LMDB-backed availability cache with tenant isolation.
//!
//! Uses the heed crate (Rust bindings for LMDB) so the fast path survives a
//! process restart and can be shared by several processes on one host.
//!
//! # Storage Layout
//!
//! - Key: the 33-byte [`TenantScopedKey`] encoding, so a tenant's entries are
//!   one contiguous key range.
//! - Value: `[expires_at_ms: i64 LE][available: i64 LE]`.
//!
//! An expired entry is treated as a miss and removed the next time it is
//! read, or when its tenant is swept.

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use stockroom_core::{CacheError, HealthCheck, StockroomError, StockroomResult, TenantId};

use super::tenant_key::TenantScopedKey;
use super::traits::{AvailabilityCache, CacheStats};

const VALUE_LEN: usize = 16;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A stored value did not have the expected layout.
    #[error("Corrupt value: {0}")]
    Corrupt(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for StockroomError {
    fn from(e: LmdbCacheError) -> Self {
        match e {
            LmdbCacheError::Corrupt(reason) => StockroomError::Cache(CacheError::Corrupt { reason }),
            other => StockroomError::Cache(CacheError::Backend {
                reason: other.to_string(),
            }),
        }
    }
}

fn txn_err(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

fn encode_value(expires_at_ms: i64, available: i64) -> [u8; VALUE_LEN] {
    let mut bytes = [0u8; VALUE_LEN];
    bytes[0..8].copy_from_slice(&expires_at_ms.to_le_bytes());
    bytes[8..16].copy_from_slice(&available.to_le_bytes());
    bytes
}

fn decode_value(bytes: &[u8]) -> Result<(i64, i64), LmdbCacheError> {
    if bytes.len() != VALUE_LEN {
        return Err(LmdbCacheError::Corrupt(format!(
            "expected {} bytes, found {}",
            VALUE_LEN,
            bytes.len()
        )));
    }
    let mut expires = [0u8; 8];
    let mut available = [0u8; 8];
    expires.copy_from_slice(&bytes[0..8]);
    available.copy_from_slice(&bytes[8..16]);
    Ok((i64::from_le_bytes(expires), i64::from_le_bytes(available)))
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// LMDB-backed availability cache.
///
/// # Example
///
/// ```ignore
/// use stockroom_storage::cache::{AvailabilityCache, LmdbAvailabilityCache, TenantScopedKey};
///
/// let cache = LmdbAvailabilityCache::new("/var/cache/stockroom", 64)?;
/// let key = TenantScopedKey::new(tenant_id, product_id);
/// cache.set(&key, 30, Duration::from_secs(300)).await?;
/// ```
pub struct LmdbAvailabilityCache {
    env: Env,
    db: Database<Bytes, Bytes>,
    stats: Arc<RwLock<CacheStats>>,
}

impl LmdbAvailabilityCache {
    /// Open (or create) a cache under `path`, capped at `max_size_mb`.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per path by this process and
        // the memory map is never accessed outside heed's transactions.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        Ok(Self {
            env,
            db,
            stats: Arc::new(RwLock::new(CacheStats::default())),
        })
    }

    fn record_hit(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.hits += 1;
        }
    }

    fn record_miss(&self, expired: bool) {
        if let Ok(mut stats) = self.stats.write() {
            stats.misses += 1;
            if expired {
                stats.expirations += 1;
            }
        }
    }

    /// Delete `key` if it is still expired at commit time.
    fn remove_if_expired(&self, encoded: &[u8]) -> Result<(), LmdbCacheError> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let expired = match self.db.get(&wtxn, encoded).map_err(txn_err)? {
            Some(bytes) => decode_value(bytes).map(|(exp, _)| exp <= now_ms()).unwrap_or(true),
            None => false,
        };
        if expired {
            self.db.delete(&mut wtxn, encoded).map_err(txn_err)?;
        }
        wtxn.commit().map_err(txn_err)
    }

    /// Collect every live key under a tenant prefix.
    fn live_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<TenantScopedKey>, LmdbCacheError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let now = now_ms();
        let mut keys = Vec::new();

        for item in self.db.prefix_iter(&rtxn, prefix).map_err(txn_err)? {
            let (key, value) = item.map_err(txn_err)?;
            let live = decode_value(value).map(|(exp, _)| exp > now).unwrap_or(false);
            if !live {
                continue;
            }
            if let Some(decoded) = TenantScopedKey::decode(key) {
                keys.push(decoded);
            }
        }

        Ok(keys)
    }

    /// Drop every entry of a tenant, expired or not. Returns how many were removed.
    pub fn invalidate_tenant(&self, tenant_id: TenantId) -> Result<u64, LmdbCacheError> {
        let prefix = TenantScopedKey::tenant_prefix(tenant_id);

        let encoded: Vec<Vec<u8>> = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            let mut keys = Vec::new();
            for item in self.db.prefix_iter(&rtxn, &prefix).map_err(txn_err)? {
                let (key, _) = item.map_err(txn_err)?;
                keys.push(key.to_vec());
            }
            keys
        };

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let mut deleted = 0u64;
        for key in &encoded {
            if self.db.delete(&mut wtxn, key).map_err(txn_err)? {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(txn_err)?;

        Ok(deleted)
    }

    /// Delete a tenant's entries that are expired or unreadable.
    fn sweep_prefix(&self, prefix: &[u8]) -> Result<u64, LmdbCacheError> {
        let now = now_ms();
        let stale: Vec<Vec<u8>> = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            let mut keys = Vec::new();
            for item in self.db.prefix_iter(&rtxn, prefix).map_err(txn_err)? {
                let (key, value) = item.map_err(txn_err)?;
                let live = decode_value(value).map(|(exp, _)| exp > now).unwrap_or(false);
                if !live {
                    keys.push(key.to_vec());
                }
            }
            keys
        };
        if stale.is_empty() {
            return Ok(0);
        }

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let mut removed = 0u64;
        for key in &stale {
            // A concurrent set may have refreshed the entry since the scan.
            let still_stale = match self.db.get(&wtxn, key).map_err(txn_err)? {
                Some(bytes) => decode_value(bytes).map(|(exp, _)| exp <= now).unwrap_or(true),
                None => false,
            };
            if still_stale && self.db.delete(&mut wtxn, key).map_err(txn_err)? {
                removed += 1;
            }
        }
        wtxn.commit().map_err(txn_err)?;

        if let Ok(mut stats) = self.stats.write() {
            stats.expirations += removed;
        }
        Ok(removed)
    }

    fn entry_count(&self) -> Result<u64, LmdbCacheError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        self.db.len(&rtxn).map_err(txn_err)
    }
}

#[async_trait]
impl AvailabilityCache for LmdbAvailabilityCache {
    async fn get(&self, key: &TenantScopedKey) -> StockroomResult<Option<i64>> {
        let encoded = key.encode();

        let value = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            match self.db.get(&rtxn, &encoded).map_err(txn_err)? {
                Some(bytes) => Some(decode_value(bytes)?),
                None => None,
            }
        };

        match value {
            Some((expires_at_ms, available)) if expires_at_ms > now_ms() => {
                self.record_hit();
                Ok(Some(available))
            }
            Some(_) => {
                self.record_miss(true);
                self.remove_if_expired(&encoded)?;
                Ok(None)
            }
            None => {
                self.record_miss(false);
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
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let value = encode_value(now_ms().saturating_add(ttl_ms), available);

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.db
            .put(&mut wtxn, &key.encode(), &value)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(())
    }

    async fn delete(&self, key: &TenantScopedKey) -> StockroomResult<bool> {
        let encoded = key.encode();
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;

        let live = match self.db.get(&wtxn, &encoded).map_err(txn_err)? {
            Some(bytes) => decode_value(bytes).map(|(exp, _)| exp > now_ms()).unwrap_or(false),
            None => false,
        };
        self.db.delete(&mut wtxn, &encoded).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;

        Ok(live)
    }

    async fn keys_for_tenant(&self, tenant_id: TenantId) -> StockroomResult<Vec<TenantScopedKey>> {
        let prefix = TenantScopedKey::tenant_prefix(tenant_id);
        Ok(self.live_keys_with_prefix(&prefix)?)
    }

    async fn sweep_expired(&self, tenant_id: TenantId) -> StockroomResult<u64> {
        let prefix = TenantScopedKey::tenant_prefix(tenant_id);
        Ok(self.sweep_prefix(&prefix)?)
    }

    async fn stats(&self) -> StockroomResult<CacheStats> {
        let mut stats = self
            .stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default();
        stats.entry_count = self.entry_count()?;
        Ok(stats)
    }

    async fn health_check(&self) -> StockroomResult<HealthCheck> {
        Ok(match self.entry_count() {
            Ok(entries) => HealthCheck::healthy("availability_cache")
                .with_metadata("backend", serde_json::json!("lmdb"))
                .with_metadata("entries", serde_json::json!(entries)),
            Err(e) => HealthCheck::unhealthy("availability_cache", e.to_string()),
        })
    }
}
