//! Inventory query facade.
//!
//! `InventoryService` is the only entry point transactional callers use. It
//! composes the durable store, the availability cache and the ledger rules:
//!
//! - Reads go through the cache and fall back to the store on a miss.
//! - Ledger writes always load from the store, apply the operation, save
//!   with a version check and then overwrite the cache entry.
//! - Whole-record writes are saved against the version the caller read.
//!
//! A failed cache refresh after a successful save is logged and left for the
//! consistency checker to repair. The store write is never rolled back.

use std::sync::Arc;

use stockroom_core::{
    HealthCheck, InventoryError, InventoryRecord, ProductId, StockroomConfig, StockroomError,
    StockroomResult, TenantId,
};

use crate::cache::{AvailabilityCache, TenantScopedKey};
use crate::store::InventoryStore;

/// Read-through / write-through facade over a store and a cache.
///
/// # Example
///
/// ```ignore
/// let service = InventoryService::new(store, cache, StockroomConfig::from_env())?;
/// service.reserve(tenant_id, product_id, 2).await?;
/// let ok = service.check_availability(tenant_id, product_id, 5).await?;
/// ```
pub struct InventoryService<S: ?Sized, C: ?Sized> {
    store: Arc<S>,
    cache: Arc<C>,
    config: StockroomConfig,
}

impl<S: ?Sized, C: ?Sized> Clone for InventoryService<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
        }
    }
}

impl<S, C> InventoryService<S, C>
where
    S: InventoryStore + ?Sized,
    C: AvailabilityCache + ?Sized,
{
    /// Build a facade, rejecting a configuration that fails
    /// [`StockroomConfig::validate`].
    pub fn new(store: Arc<S>, cache: Arc<C>, config: StockroomConfig) -> StockroomResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            cache,
            config,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    pub fn config(&self) -> &StockroomConfig {
        &self.config
    }

    /// A fresh record carrying the configured default low-stock threshold.
    pub fn new_record(&self, tenant_id: TenantId, product_id: ProductId) -> InventoryRecord {
        InventoryRecord::new(tenant_id, product_id)
            .with_low_stock_threshold(self.config.default_low_stock_threshold)
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Load a record, populating the cache on a miss.
    ///
    /// The cache only holds the available quantity, so the record itself is
    /// always read from the store.
    pub async fn get(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> StockroomResult<InventoryRecord> {
        let key = TenantScopedKey::new(tenant_id, product_id);
        let cached = self.cache_lookup(&key).await;

        let record = self.load(tenant_id, product_id).await?;

        match cached {
            Some(available) => {
                tracing::debug!(%tenant_id, %product_id, available, "Inventory cache hit");
            }
            None => {
                tracing::debug!(%tenant_id, %product_id, "Inventory cache miss");
                self.refresh_cache(&record).await;
            }
        }

        Ok(record)
    }

    /// Available quantity, answered from the cache when it holds a value.
    pub async fn available_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> StockroomResult<i64> {
        let key = TenantScopedKey::new(tenant_id, product_id);
        if let Some(available) = self.cache_lookup(&key).await {
            return Ok(available);
        }

        let record = self.load(tenant_id, product_id).await?;
        self.refresh_cache(&record).await;
        Ok(record.available_quantity())
    }

    /// Whether `quantity` more units could be reserved.
    ///
    /// A missing record is simply not available. Store failures propagate.
    pub async fn check_availability(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
    ) -> StockroomResult<bool> {
        match self.get(tenant_id, product_id).await {
            Ok(record) => Ok(record.can_fulfill(quantity)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Insert or update a record after validating it.
    ///
    /// The save is checked against `record.version`: version 0 inserts a
    /// record that must not exist yet, any other version must match the
    /// stored one. A stale record fails with `VersionConflict` instead of
    /// overwriting newer changes. Conflicts are not retried here because the
    /// caller's view is what is out of date.
    pub async fn create_or_update(
        &self,
        record: InventoryRecord,
    ) -> StockroomResult<InventoryRecord> {
        record.validate()?;

        match self.store.save(&record).await {
            Ok(stored) => {
                self.refresh_cache(&stored).await;
                tracing::debug!(
                    tenant_id = %stored.tenant_id,
                    product_id = %stored.product_id,
                    version = stored.version,
                    "Inventory record saved"
                );
                Ok(stored)
            }
            Err(e) => {
                if e.is_version_conflict() {
                    tracing::info!(
                        tenant_id = %record.tenant_id,
                        product_id = %record.product_id,
                        version = record.version,
                        "Rejected save of a stale inventory record"
                    );
                }
                Err(e)
            }
        }
    }

    /// Hold `quantity` units for an order.
    pub async fn reserve(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
    ) -> StockroomResult<InventoryRecord> {
        self.mutate(tenant_id, product_id, "reserve", |r| r.reserve(quantity))
            .await
    }

    /// Give back `quantity` reserved units.
    pub async fn release_reservation(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
    ) -> StockroomResult<InventoryRecord> {
        self.mutate(tenant_id, product_id, "release_reservation", |r| {
            r.release_reservation(quantity)
        })
        .await
    }

    /// Remove `quantity` units of physical stock.
    pub async fn deduct(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
    ) -> StockroomResult<InventoryRecord> {
        self.mutate(tenant_id, product_id, "deduct", |r| r.deduct(quantity))
            .await
    }

    /// Add `quantity` units of physical stock.
    pub async fn restock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
    ) -> StockroomResult<InventoryRecord> {
        self.mutate(tenant_id, product_id, "restock", |r| r.restock(quantity))
            .await
    }

    /// Ship `quantity` reserved units in one atomic step.
    pub async fn fulfill(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
    ) -> StockroomResult<InventoryRecord> {
        self.mutate(tenant_id, product_id, "fulfill", |r| r.fulfill(quantity))
            .await
    }

    /// Delete a record and evict its cache entry.
    ///
    /// The cache entry is evicted even when the record did not exist, in
    /// which case `NotFound` is still returned.
    pub async fn delete(&self, tenant_id: TenantId, product_id: ProductId) -> StockroomResult<()> {
        let existed = self.store.delete(tenant_id, product_id).await?;

        let key = TenantScopedKey::new(tenant_id, product_id);
        if let Err(e) = self.cache.delete(&key).await {
            tracing::warn!(
                %tenant_id,
                %product_id,
                error = %e,
                "Cache eviction failed after delete; entry left for orphan purge"
            );
        }

        if existed {
            tracing::debug!(%tenant_id, %product_id, "Inventory record deleted");
            Ok(())
        } else {
            Err(not_found(tenant_id, product_id))
        }
    }

    /// Evict one cache entry. Returns whether an entry existed.
    pub async fn clear_cache(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> StockroomResult<bool> {
        self.cache
            .delete(&TenantScopedKey::new(tenant_id, product_id))
            .await
    }

    /// Health of the store and the cache, in that order.
    pub async fn health_check(&self) -> Vec<HealthCheck> {
        let store = self
            .store
            .health_check()
            .await
            .unwrap_or_else(|e| HealthCheck::unhealthy("inventory_store", e.to_string()));
        let cache = self
            .cache
            .health_check()
            .await
            .unwrap_or_else(|e| HealthCheck::unhealthy("availability_cache", e.to_string()));
        vec![store, cache]
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    async fn load(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> StockroomResult<InventoryRecord> {
        self.store
            .get(tenant_id, product_id)
            .await?
            .ok_or_else(|| not_found(tenant_id, product_id))
    }

    /// Load, apply, save; retried from the load on a version conflict.
    async fn mutate<F>(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        operation: &'static str,
        apply: F,
    ) -> StockroomResult<InventoryRecord>
    where
        F: Fn(&mut InventoryRecord) -> Result<(), InventoryError> + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let mut record = self.load(tenant_id, product_id).await?;
            apply(&mut record)?;

            match self.store.save(&record).await {
                Ok(stored) => {
                    self.refresh_cache(&stored).await;
                    tracing::debug!(
                        %tenant_id,
                        %product_id,
                        operation,
                        quantity = stored.quantity,
                        reserved = stored.reserved_quantity,
                        version = stored.version,
                        "Inventory updated"
                    );
                    return Ok(stored);
                }
                Err(e) if e.is_version_conflict() && attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    tracing::debug!(
                        %tenant_id,
                        %product_id,
                        operation,
                        attempt,
                        "Version conflict, retrying"
                    );
                }
                Err(e) => {
                    if e.is_version_conflict() {
                        tracing::warn!(
                            %tenant_id,
                            %product_id,
                            operation,
                            retries = self.config.max_conflict_retries,
                            "Giving up after repeated version conflicts"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Cache read where any failure counts as a miss.
    async fn cache_lookup(&self, key: &TenantScopedKey) -> Option<i64> {
        match self.cache.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    tenant_id = %key.tenant_id(),
                    product_id = %key.product_id(),
                    error = %e,
                    "Cache read failed, falling back to store"
                );
                None
            }
        }
    }

    async fn refresh_cache(&self, record: &InventoryRecord) {
        let key = TenantScopedKey::new(record.tenant_id, record.product_id);
        if let Err(e) = self
            .cache
            .set(&key, record.available_quantity(), self.config.cache_ttl)
            .await
        {
            tracing::warn!(
                tenant_id = %record.tenant_id,
                product_id = %record.product_id,
                error = %e,
                "Cache refresh failed; entry is stale until reconciled"
            );
        }
    }
}

fn not_found(tenant_id: TenantId, product_id: ProductId) -> StockroomError {
    StockroomError::Inventory(InventoryError::NotFound {
        tenant_id,
        product_id,
    })
}
