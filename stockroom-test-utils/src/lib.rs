//! Stockroom Test Utilities
//!
//! Shared test infrastructure for the Stockroom workspace:
//! - Proptest generators for inventory records and ledger operations
//! - Fixtures for common scenarios
//! - Fault-injecting store and cache doubles
//! - Custom assertions for Stockroom errors

pub use stockroom_core::{
    InventoryError, InventoryIssue, InventoryRecord, IssueType, ProductId, Severity,
    StockroomConfig, StockroomError, StockroomResult, StorageError, TenantId, Timestamp,
};
pub use stockroom_storage::{
    AvailabilityCache, CacheStats, InMemoryAvailabilityCache, InMemoryInventoryStore,
    InventoryStore, TenantScopedKey,
};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stockroom_core::{CacheError, HealthCheck};
use uuid::Uuid;

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for inventory types.

    use super::*;
    use proptest::prelude::*;

    /// A single ledger operation with its quantity argument.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LedgerOp {
        Reserve(i64),
        Release(i64),
        Deduct(i64),
        Restock(i64),
        Fulfill(i64),
    }

    impl LedgerOp {
        /// Apply this operation to a record through the ledger rules.
        pub fn apply(self, record: &mut InventoryRecord) -> Result<(), InventoryError> {
            match self {
                LedgerOp::Reserve(n) => record.reserve(n),
                LedgerOp::Release(n) => record.release_reservation(n),
                LedgerOp::Deduct(n) => record.deduct(n),
                LedgerOp::Restock(n) => record.restock(n),
                LedgerOp::Fulfill(n) => record.fulfill(n),
            }
        }
    }

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        arb_uuid()
    }

    pub fn arb_product_id() -> impl Strategy<Value = ProductId> {
        arb_uuid()
    }

    /// Generate a ledger operation with a positive quantity below `max`.
    pub fn arb_ledger_op(max: i64) -> impl Strategy<Value = LedgerOp> {
        let max = max.max(2);
        prop_oneof![
            (1..max).prop_map(LedgerOp::Reserve),
            (1..max).prop_map(LedgerOp::Release),
            (1..max).prop_map(LedgerOp::Deduct),
            (1..max).prop_map(LedgerOp::Restock),
            (1..max).prop_map(LedgerOp::Fulfill),
        ]
    }

    /// Generate a record that satisfies every structural invariant.
    pub fn arb_valid_record() -> impl Strategy<Value = InventoryRecord> {
        (
            arb_tenant_id(),
            arb_product_id(),
            0i64..10_000,
            0i64..10_000,
            0i64..100,
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(
                |(tenant_id, product_id, quantity, reserved, threshold, track, backorder)| {
                    InventoryRecord::new(tenant_id, product_id)
                        .with_quantity(quantity)
                        .with_reserved(reserved.min(quantity))
                        .with_low_stock_threshold(threshold)
                        .with_tracking(track)
                        .with_backorder(backorder)
                },
            )
    }

    /// Generate a record that may violate the structural invariants, the way
    /// rows written by an external process can.
    pub fn arb_any_record() -> impl Strategy<Value = InventoryRecord> {
        (
            arb_tenant_id(),
            arb_product_id(),
            -100i64..1_000,
            -100i64..1_000,
            0i64..100,
        )
            .prop_map(|(tenant_id, product_id, quantity, reserved, threshold)| {
                InventoryRecord::new(tenant_id, product_id)
                    .with_quantity(quantity)
                    .with_reserved(reserved)
                    .with_low_stock_threshold(threshold)
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;

    /// A tracked record with `quantity` on hand and nothing reserved.
    pub fn stocked(tenant_id: TenantId, quantity: i64) -> InventoryRecord {
        InventoryRecord::new(tenant_id, Uuid::now_v7()).with_quantity(quantity)
    }

    /// A record whose reservations exceed its stock without backorder.
    pub fn corrupted(tenant_id: TenantId) -> InventoryRecord {
        stocked(tenant_id, 10).with_reserved(15)
    }

    /// An empty record that accepts backorders.
    pub fn backorderable(tenant_id: TenantId) -> InventoryRecord {
        stocked(tenant_id, 0).with_backorder(true)
    }

    /// Default configuration with a short TTL and a generous retry budget.
    pub fn test_config() -> StockroomConfig {
        StockroomConfig::default()
            .with_cache_ttl(Duration::from_secs(60))
            .with_max_conflict_retries(64)
            .with_reconcile_concurrency(4)
    }

    /// Fresh in-memory store and cache, shared behind `Arc`s.
    pub fn in_memory_tiers() -> (Arc<InMemoryInventoryStore>, Arc<InMemoryAvailabilityCache>) {
        (
            Arc::new(InMemoryInventoryStore::new()),
            Arc::new(InMemoryAvailabilityCache::new()),
        )
    }
}

// ============================================================================
// FAULT INJECTION
// ============================================================================

fn injected_storage_failure(operation: &str) -> StockroomError {
    StockroomError::Storage(StorageError::Unavailable {
        reason: format!("injected {} failure", operation),
    })
}

fn injected_cache_failure(operation: &str) -> StockroomError {
    StockroomError::Cache(CacheError::Unavailable {
        reason: format!("injected {} failure", operation),
    })
}

/// Store wrapper whose operations can be made to fail on demand.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: InMemoryInventoryStore,
    fail_get: AtomicBool,
    fail_save: AtomicBool,
    fail_delete: AtomicBool,
    fail_list: AtomicBool,
    /// Remaining saves to reject with a version conflict.
    conflicts: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: InMemoryInventoryStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn inner(&self) -> &InMemoryInventoryStore {
        &self.inner
    }

    pub fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Reject the next `count` saves with `VersionConflict`.
    pub fn inject_conflicts(&self, count: u32) {
        self.conflicts.store(count, Ordering::SeqCst);
    }

    fn take_conflict(&self) -> bool {
        self.conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl InventoryStore for FlakyStore {
    async fn get(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> StockroomResult<Option<InventoryRecord>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(injected_storage_failure("get"));
        }
        self.inner.get(tenant_id, product_id).await
    }

    async fn save(&self, record: &InventoryRecord) -> StockroomResult<InventoryRecord> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(injected_storage_failure("save"));
        }
        if self.take_conflict() {
            return Err(StockroomError::Storage(StorageError::VersionConflict {
                product_id: record.product_id,
                expected: record.version,
                actual: record.version + 1,
            }));
        }
        self.inner.save(record).await
    }

    async fn delete(&self, tenant_id: TenantId, product_id: ProductId) -> StockroomResult<bool> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected_storage_failure("delete"));
        }
        self.inner.delete(tenant_id, product_id).await
    }

    async fn list_all(&self, tenant_id: TenantId) -> StockroomResult<Vec<InventoryRecord>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(injected_storage_failure("list_all"));
        }
        self.inner.list_all(tenant_id).await
    }

    async fn health_check(&self) -> StockroomResult<HealthCheck> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Ok(HealthCheck::unhealthy("inventory_store", "injected failure"));
        }
        self.inner.health_check().await
    }
}

/// Cache wrapper whose operations can be made to fail on demand.
#[derive(Debug, Default)]
pub struct FlakyCache {
    inner: InMemoryAvailabilityCache,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_delete: AtomicBool,
    fail_keys: AtomicBool,
    fail_sweep: AtomicBool,
}

impl FlakyCache {
    pub fn new(inner: InMemoryAvailabilityCache) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn inner(&self) -> &InMemoryAvailabilityCache {
        &self.inner
    }

    pub fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_set(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_keys(&self, fail: bool) {
        self.fail_keys.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sweep(&self, fail: bool) {
        self.fail_sweep.store(fail, Ordering::SeqCst);
    }

    /// Make every operation fail or succeed.
    pub fn fail_all(&self, fail: bool) {
        self.fail_get(fail);
        self.fail_set(fail);
        self.fail_delete(fail);
        self.fail_keys(fail);
        self.fail_sweep(fail);
    }
}

#[async_trait]
impl AvailabilityCache for FlakyCache {
    async fn get(&self, key: &TenantScopedKey) -> StockroomResult<Option<i64>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(injected_cache_failure("get"));
        }
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: &TenantScopedKey,
        available: i64,
        ttl: Duration,
    ) -> StockroomResult<()> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(injected_cache_failure("set"));
        }
        self.inner.set(key, available, ttl).await
    }

    async fn delete(&self, key: &TenantScopedKey) -> StockroomResult<bool> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected_cache_failure("delete"));
        }
        self.inner.delete(key).await
    }

    async fn keys_for_tenant(&self, tenant_id: TenantId) -> StockroomResult<Vec<TenantScopedKey>> {
        if self.fail_keys.load(Ordering::SeqCst) {
            return Err(injected_cache_failure("keys_for_tenant"));
        }
        self.inner.keys_for_tenant(tenant_id).await
    }

    async fn sweep_expired(&self, tenant_id: TenantId) -> StockroomResult<u64> {
        if self.fail_sweep.load(Ordering::SeqCst) {
            return Err(injected_cache_failure("sweep_expired"));
        }
        self.inner.sweep_expired(tenant_id).await
    }

    async fn stats(&self) -> StockroomResult<CacheStats> {
        self.inner.stats().await
    }

    async fn health_check(&self) -> StockroomResult<HealthCheck> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Ok(HealthCheck::unhealthy("availability_cache", "injected failure"));
        }
        self.inner.health_check().await
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Stockroom-specific error shapes.

    use super::*;

    /// Assert that a result is `InventoryError::NotFound`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &StockroomResult<T>) {
        match result {
            Err(StockroomError::Inventory(InventoryError::NotFound { .. })) => {}
            other => panic!("Expected NotFound, got: {:?}", other),
        }
    }

    /// Assert that a result is `InventoryError::InsufficientStock` with the
    /// given numbers.
    #[track_caller]
    pub fn assert_insufficient<T: std::fmt::Debug>(
        result: &StockroomResult<T>,
        requested: i64,
        available: i64,
    ) {
        match result {
            Err(StockroomError::Inventory(InventoryError::InsufficientStock {
                requested: r,
                available: a,
                ..
            })) => {
                assert_eq!(*r, requested, "Wrong requested quantity");
                assert_eq!(*a, available, "Wrong available quantity");
            }
            other => panic!(
                "Expected InsufficientStock({}, {}), got: {:?}",
                requested, available, other
            ),
        }
    }

    /// Assert that a result is `InventoryError::InvalidArgument`.
    #[track_caller]
    pub fn assert_invalid_argument<T: std::fmt::Debug>(result: &StockroomResult<T>) {
        match result {
            Err(StockroomError::Inventory(InventoryError::InvalidArgument { .. })) => {}
            other => panic!("Expected InvalidArgument, got: {:?}", other),
        }
    }

    /// Assert that a record satisfies the non-backorder ledger bounds.
    #[track_caller]
    pub fn assert_within_bounds(record: &InventoryRecord) {
        assert!(record.quantity >= 0, "negative quantity: {:?}", record);
        assert!(record.reserved_quantity >= 0, "negative reserved: {:?}", record);
        assert!(
            record.reserved_quantity <= record.quantity,
            "reserved exceeds quantity: {:?}",
            record
        );
    }

    /// Assert that exactly one issue of `issue_type` is present.
    #[track_caller]
    pub fn assert_single_issue(issues: &[InventoryIssue], issue_type: IssueType) {
        let matching = issues.iter().filter(|i| i.issue_type == issue_type).count();
        assert_eq!(matching, 1, "Expected one {} issue in {:?}", issue_type, issues);
    }
}

// ============================================================================
// TESTS
// ============================================================================
