//! Durable inventory store contract and the in-memory reference backend.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use stockroom_core::{
    HealthCheck, InventoryRecord, ProductId, StockroomError, StockroomResult, StorageError,
    TenantId,
};

/// Authoritative storage for inventory records.
///
/// Every method takes the tenant explicitly. Implementations must make
/// [`InventoryStore::save`] a compare-and-swap on `version`.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Load a record. `None` when it does not exist.
    async fn get(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> StockroomResult<Option<InventoryRecord>>;

    /// Insert or update a record.
    ///
    /// `record.version` must equal the stored version (0 for a record that
    /// does not exist yet), otherwise `StorageError::VersionConflict`.
    /// Returns the record as stored, with its version bumped.
    async fn save(&self, record: &InventoryRecord) -> StockroomResult<InventoryRecord>;

    /// Delete a record. Returns whether it existed.
    async fn delete(&self, tenant_id: TenantId, product_id: ProductId) -> StockroomResult<bool>;

    /// Every record belonging to a tenant, in no particular order.
    async fn list_all(&self, tenant_id: TenantId) -> StockroomResult<Vec<InventoryRecord>>;

    async fn health_check(&self) -> StockroomResult<HealthCheck>;
}

type RecordMap = HashMap<(TenantId, ProductId), InventoryRecord>;

/// In-memory store for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct InMemoryInventoryStore {
    records: Arc<RwLock<RecordMap>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a record as-is, bypassing version checks and validation.
    ///
    /// Stands in for an external process writing straight to the database,
    /// which is how corrupted rows end up in the store.
    pub fn put_raw(&self, record: InventoryRecord) -> StockroomResult<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.insert((record.tenant_id, record.product_id), record);
        Ok(())
    }

    /// Number of stored records across all tenants.
    pub fn len(&self) -> StockroomResult<usize> {
        Ok(self.records.read().map_err(|_| poisoned())?.len())
    }

    pub fn is_empty(&self) -> StockroomResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn get(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> StockroomResult<Option<InventoryRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.get(&(tenant_id, product_id)).cloned())
    }

    async fn save(&self, record: &InventoryRecord) -> StockroomResult<InventoryRecord> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let key = (record.tenant_id, record.product_id);

        let current = records.get(&key).map(|r| r.version).unwrap_or(0);
        if current != record.version {
            return Err(StockroomError::Storage(StorageError::VersionConflict {
                product_id: record.product_id,
                expected: record.version,
                actual: current,
            }));
        }

        let mut stored = record.clone();
        stored.version = current + 1;
        stored.updated_at = Utc::now();
        records.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, tenant_id: TenantId, product_id: ProductId) -> StockroomResult<bool> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        Ok(records.remove(&(tenant_id, product_id)).is_some())
    }

    async fn list_all(&self, tenant_id: TenantId) -> StockroomResult<Vec<InventoryRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StockroomResult<HealthCheck> {
        match self.records.read() {
            Ok(records) => Ok(HealthCheck::healthy("inventory_store")
                .with_metadata("records", serde_json::json!(records.len()))),
            Err(_) => Ok(HealthCheck::unhealthy("inventory_store", "lock poisoned")),
        }
    }
}

fn poisoned() -> StockroomError {
    StockroomError::Storage(StorageError::LockPoisoned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(tenant_id: TenantId) -> InventoryRecord {
        InventoryRecord::new(tenant_id, Uuid::now_v7()).with_quantity(10)
    }

    #[tokio::test]
    async fn test_save_and_get_bumps_version() {
        let store = InMemoryInventoryStore::new();
        let r = record(Uuid::now_v7());

        let stored = store.save(&r).await.expect("insert");
        assert_eq!(stored.version, 1);

        let loaded = store
            .get(r.tenant_id, r.product_id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(loaded, stored);

        let again = store.save(&loaded).await.expect("update");
        assert_eq!(again.version, 2);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = InMemoryInventoryStore::new();
        let r = record(Uuid::now_v7());
        let v1 = store.save(&r).await.expect("insert");

        store.save(&v1).await.expect("first writer wins");

        let err = store.save(&v1).await.expect_err("second writer is stale");
        assert!(err.is_version_conflict());
        assert!(matches!(
            err,
            StockroomError::Storage(StorageError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_insert_with_nonzero_version_conflicts() {
        let store = InMemoryInventoryStore::new();
        let mut r = record(Uuid::now_v7());
        r.version = 4;
        let err = store.save(&r).await.expect_err("nothing stored yet");
        assert!(err.is_version_conflict());
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = InMemoryInventoryStore::new();
        let r = record(Uuid::now_v7());
        store.save(&r).await.expect("insert");

        assert!(store.delete(r.tenant_id, r.product_id).await.expect("delete"));
        assert!(!store.delete(r.tenant_id, r.product_id).await.expect("delete"));
        assert!(store.get(r.tenant_id, r.product_id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_list_all_is_tenant_scoped() {
        let store = InMemoryInventoryStore::new();
        let tenant_a = Uuid::now_v7();
        let tenant_b = Uuid::now_v7();
        for _ in 0..3 {
            store.save(&record(tenant_a)).await.expect("insert");
        }
        store.save(&record(tenant_b)).await.expect("insert");

        assert_eq!(store.list_all(tenant_a).await.expect("list").len(), 3);
        assert_eq!(store.list_all(tenant_b).await.expect("list").len(), 1);
        assert!(store.list_all(Uuid::now_v7()).await.expect("list").is_empty());
        assert_eq!(store.len().expect("len"), 4);
    }

    #[tokio::test]
    async fn test_put_raw_skips_checks() {
        let store = InMemoryInventoryStore::new();
        let corrupted = record(Uuid::now_v7()).with_reserved(15);
        store.put_raw(corrupted.clone()).expect("raw write");

        let loaded = store
            .get(corrupted.tenant_id, corrupted.product_id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(loaded.reserved_quantity, 15);
        assert!(store.health_check().await.expect("health").is_healthy());
    }
}
